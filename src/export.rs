// Roster export - hand the checked-in list to the organizer as CSV

use anyhow::{Context, Result};
use std::path::Path;

use crate::registry::Attendee;

/// Write the full roster to `path` as CSV, one attendee per row, headers
/// matching the snapshot field names. Returns the number of rows written.
pub fn export_csv(attendees: &[Attendee], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file at {}", path.display()))?;

    for attendee in attendees {
        writer
            .serialize(attendee)
            .context("Failed to serialize attendee")?;
    }

    writer.flush().context("Failed to flush CSV file")?;

    Ok(attendees.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee(id: u64, first: &str, last: &str, code: &str) -> Attendee {
        Attendee {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            code: code.to_string(),
            checked_in: true,
            check_in_time: Some("09:15".to_string()),
        }
    }

    #[test]
    fn test_export_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");

        let roster = vec![
            attendee(1, "Somchai", "Dee", "660610001"),
            attendee(2, "Suda", "Chai", "660610002"),
        ];

        assert_eq!(export_csv(&roster, &path).unwrap(), 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();

        // Headers use the snapshot field names
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec![
                "id",
                "firstName",
                "lastName",
                "code",
                "checkedIn",
                "checkInTime",
            ])
        );

        let read_back: Vec<Attendee> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(read_back, roster);
    }

    #[test]
    fn test_export_empty_roster_yields_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");

        assert_eq!(export_csv(&[], &path).unwrap(), 0);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 0);
    }
}
