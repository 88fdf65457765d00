//! T-SQL quoting for identifiers and string literals spliced into DDL.

/// `[name]`, doubling any closing bracket.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `'value'`, doubling any single quote.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `N'value'` for values compared against `sysname` columns.
pub fn quote_nliteral(value: &str) -> String {
    format!("N{}", quote_literal(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_delimiters() {
        assert_eq!(quote_ident("Billing]Data"), "[Billing]]Data]");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_nliteral("x"), "N'x'");
    }
}
