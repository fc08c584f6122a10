use std::fs::File;
use std::io::Read;
use std::path::Path;

use recipebot_core::{InputError, InputRecord};

pub const ID_COLUMN: &str = "id";
pub const QUERY_COLUMN: &str = "query";
pub const FOLLOWUP_COLUMN_PREFIX: &str = "human_followup_";

/// Reads bulk input records from a CSV file.
///
/// Rows are returned as found; batch validation (blank ids, duplicates) is
/// left to the dispatcher so every entry point applies the same rules.
pub fn read_records(path: &Path) -> Result<Vec<InputRecord>, InputError> {
    let file = File::open(path)
        .map_err(|source| InputError::Read { path: path.to_path_buf(), source })?;
    parse_records(file, path)
}

pub fn parse_records<R: Read>(reader: R, source: &Path) -> Result<Vec<InputRecord>, InputError> {
    let malformed = |error: csv::Error| InputError::Malformed {
        path: source.to_path_buf(),
        message: error.to_string(),
    };

    // Trailing optional follow-up cells may be left out entirely.
    let mut reader =
        csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(malformed)?.clone();

    let column = |name: &str| headers.iter().position(|header| header == name);
    let id_index = column(ID_COLUMN).ok_or(InputError::MissingColumn(ID_COLUMN))?;
    let query_index = column(QUERY_COLUMN).ok_or(InputError::MissingColumn(QUERY_COLUMN))?;

    // human_followup_1, human_followup_2, ... up to the first missing column.
    let followup_indexes = (1..)
        .map(|n| column(&format!("{FOLLOWUP_COLUMN_PREFIX}{n}")))
        .take_while(Option::is_some)
        .flatten()
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(malformed)?;
        if row.len() > headers.len() {
            let line = row.position().map_or(0, |position| position.line());
            return Err(InputError::Malformed {
                path: source.to_path_buf(),
                message: format!(
                    "line {line}: found {} fields, but the header has {}",
                    row.len(),
                    headers.len()
                ),
            });
        }
        let field = |index: usize| row.get(index).unwrap_or_default();

        let followups = followup_indexes
            .iter()
            .map(|index| field(*index))
            .take_while(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        records.push(
            InputRecord::new(field(id_index), field(query_index)).with_followups(followups),
        );
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use recipebot_core::InputError;

    use super::parse_records;

    fn parse(raw: &str) -> Result<Vec<recipebot_core::InputRecord>, InputError> {
        parse_records(raw.as_bytes(), Path::new("queries.csv"))
    }

    #[test]
    fn followups_are_read_in_order_until_a_gap() {
        let records = parse(
            "id,query,human_followup_1,human_followup_2,human_followup_3\n\
             1,salmon recipe,,,\n\
             2,banana bread,make it vegan,,add walnuts\n\
             3,tacos,spicier,for four people,\n",
        )
        .expect("csv should parse");

        assert_eq!(records.len(), 3);
        assert!(records[0].followups.is_empty());
        assert_eq!(records[1].followups, vec!["make it vegan"]);
        assert_eq!(records[2].followups, vec!["spicier", "for four people"]);
    }

    #[test]
    fn followup_columns_stop_at_first_missing_number() {
        let records = parse(
            "id,query,human_followup_1,human_followup_3\n\
             1,soup,thicker,ignored\n",
        )
        .expect("csv should parse");
        assert_eq!(records[0].followups, vec!["thicker"]);
    }

    #[test]
    fn quoted_fields_with_commas_and_whitespace_are_trimmed() {
        let records = parse("id , query\n 7 ,\"  eggs, rice and peas  \"\n").expect("parse");
        assert_eq!(records[0].id.0, "7");
        assert_eq!(records[0].initial_query, "eggs, rice and peas");
    }

    #[test]
    fn missing_query_column_is_reported() {
        let error = parse("id,question\n1,soup\n").expect_err("missing column must fail");
        assert!(matches!(error, InputError::MissingColumn("query")));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let error = parse("id,query\n1,soup,extra\n").expect_err("ragged row must fail");
        assert!(matches!(
            error,
            InputError::Malformed { ref message, .. } if message.contains("line 2")
        ));
    }

    #[test]
    fn short_rows_treat_missing_followups_as_absent() {
        let records = parse(
            "id,query,human_followup_1,human_followup_2
             1,salmon recipe
             2,banana bread,make it vegan
",
        )
        .expect("short rows should parse");

        assert_eq!(records.len(), 2);
        assert!(records[0].followups.is_empty());
        assert_eq!(records[0].initial_query, "salmon recipe");
        assert_eq!(records[1].followups, vec!["make it vegan"]);
    }

    #[test]
    fn header_only_file_yields_no_records() {
        assert!(parse("id,query\n").expect("parse").is_empty());
    }
}
