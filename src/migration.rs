/// Legacy preference encodings
///
/// Older releases stored some multi-select fields as opaque joined codes.
/// The tables here map every known code to its canonical comma-joined form.
/// They are pure data; `migrate_value` is the only code that reads them.
use crate::preferences::PrefValue;
use tracing::debug;

/// `secondRow` codes: v = version, m = maint, d = date, p = price
pub const SECOND_ROW_CODES: &[(&str, &str)] = &[
    ("v&m", "version,maint"),
    ("v&d", "version,date"),
    ("v&p", "version,price"),
    ("m&d", "maint,date"),
    ("m&p", "maint,price"),
    ("d&p", "date,price"),
    ("p&v&m", "price,version,maint"),
    ("p&v&d", "price,version,date"),
    ("p&m&d", "price,maint,date"),
];

/// Migration tables keyed by setting name
pub const MIGRATIONS: &[(&str, &[(&str, &str)])] = &[("secondRow", SECOND_ROW_CODES)];

/// Lookup table for a setting, if it has one
pub fn table_for(key: &str) -> Option<&'static [(&'static str, &'static str)]> {
    MIGRATIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, table)| *table)
}

/// Rewrite a persisted value into its canonical encoding.
///
/// Unknown codes and non-string values pass through unchanged, so running
/// this on already-canonical data is a no-op.
pub fn migrate_value(key: &str, value: PrefValue) -> PrefValue {
    let Some(table) = table_for(key) else {
        return value;
    };

    match &value {
        PrefValue::Text(code) => match table.iter().find(|(old, _)| old == code) {
            Some((old, canonical)) => {
                debug!(key, from = old, to = canonical, "Migrated legacy preference code");
                PrefValue::Text((*canonical).to_string())
            }
            None => value,
        },
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> PrefValue {
        PrefValue::Text(s.to_string())
    }

    #[test]
    fn test_second_row_table_has_nine_codes() {
        assert_eq!(SECOND_ROW_CODES.len(), 9);
        for (_, canonical) in SECOND_ROW_CODES {
            assert!(!canonical.contains('&'));
        }
    }

    #[test]
    fn test_known_codes_expand() {
        assert_eq!(migrate_value("secondRow", text("v&m")), text("version,maint"));
        assert_eq!(
            migrate_value("secondRow", text("p&v&d")),
            text("price,version,date")
        );
    }

    #[test]
    fn test_unknown_code_passes_through() {
        assert_eq!(migrate_value("secondRow", text("zzz")), text("zzz"));
        assert_eq!(migrate_value("secondRow", PrefValue::Bool(true)), PrefValue::Bool(true));
    }

    #[test]
    fn test_other_keys_untouched() {
        // Same spelling under a different key is not a legacy code
        assert_eq!(migrate_value("theme", text("v&m")), text("v&m"));
    }

    #[test]
    fn test_migration_idempotent() {
        for (old, _) in SECOND_ROW_CODES {
            let once = migrate_value("secondRow", text(old));
            let twice = migrate_value("secondRow", once.clone());
            assert_eq!(once, twice);
        }
    }
}
