#![allow(dead_code)]

use proptest::prelude::*;

/// Strategy for free-text field values, including delimiters, quotes and line breaks
pub fn field_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{1,12}",
        Just("O'Brien, J".to_string()),
        Just("say \"hi\"".to_string()),
        Just("line one\nline two".to_string()),
        Just("'); DROP TABLE forex.customer_transactions; --".to_string()),
    ]
}

/// Strategy for source bodies: `count` rows with unique keys `1..=count`
pub fn source_rows_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec((field_value_strategy(), 0u32..100_000), 0..=max_rows).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (memo, cents))| {
                    vec![
                        (i + 1).to_string(),
                        memo,
                        format!("{}.{:02}", cents / 100, cents % 100),
                    ]
                })
                .collect()
        },
    )
}

/// Strategy for chunk sizes
pub fn chunk_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=15
}
