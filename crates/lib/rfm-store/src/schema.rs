use crate::models::{Dtype, Stype};

pub const ENV_API_KEY: &str = "KUMO_API_KEY";

pub const DEFAULT_SESSION_NAME: &str = "default";

pub const SUFFIX_CSV: &str = "csv";
pub const SUFFIX_PARQUET: &str = "parquet";
pub const TABLE_FILE_SUFFIXES: [&str; 2] = [SUFFIX_CSV, SUFFIX_PARQUET];

pub const MAX_NUM_NEIGHBOR_HOPS: usize = 6;
pub const DEFAULT_MAX_PQ_ITERATIONS: u32 = 20;

/// Returns whether a column of `dtype` can be interpreted with `stype`.
#[must_use]
pub const fn stype_supports(stype: Stype, dtype: Dtype) -> bool {
    match stype {
        Stype::Numerical => matches!(dtype, Dtype::Int | Dtype::Float),
        Stype::Categorical => {
            matches!(dtype, Dtype::Int | Dtype::Float | Dtype::String | Dtype::Bool)
        }
        Stype::MultiCategorical => matches!(dtype, Dtype::String | Dtype::List),
        Stype::Text => matches!(dtype, Dtype::String),
        Stype::Id => matches!(dtype, Dtype::Int | Dtype::String),
        Stype::Timestamp => {
            matches!(dtype, Dtype::Date | Dtype::Timestamp | Dtype::String | Dtype::Int)
        }
        Stype::Sequence => matches!(dtype, Dtype::List),
    }
}

/// Returns whether `path` ends with one of the supported table file suffixes.
#[must_use]
pub fn is_table_file(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, suffix)| {
        TABLE_FILE_SUFFIXES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(suffix))
    })
}

/// Masks a credential for display, keeping only its first eight characters.
#[must_use]
pub fn mask_credential(credential: &str) -> String {
    let prefix: String = credential.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_stype_requires_key_like_dtype() {
        assert!(stype_supports(Stype::Id, Dtype::Int));
        assert!(stype_supports(Stype::Id, Dtype::String));
        assert!(!stype_supports(Stype::Id, Dtype::Float));
        assert!(!stype_supports(Stype::Numerical, Dtype::String));
    }

    #[test]
    fn table_files_match_known_suffixes() {
        assert!(is_table_file("data/USERS.csv"));
        assert!(is_table_file("data/ORDERS.PARQUET"));
        assert!(!is_table_file("data/notes.txt"));
        assert!(!is_table_file("README"));
    }

    #[test]
    fn credentials_are_masked() {
        assert_eq!(mask_credential("abcdefghijkl"), "abcdefgh...");
        assert_eq!(mask_credential("abc"), "abc...");
    }
}
