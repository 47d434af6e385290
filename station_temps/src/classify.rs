use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::UploadedFile;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Station {
    E2,
    E5,
    E6,
}

impl Station {
    /// Priority order for classification and left-to-right column order.
    pub const ALL: [Station; 3] = [Station::E2, Station::E5, Station::E6];

    pub fn marker(self) -> &'static str {
        match self {
            Station::E2 => "E2",
            Station::E5 => "E5",
            Station::E6 => "E6",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Station::E2 => "Estación 2",
            Station::E5 => "Estación 5",
            Station::E6 => "Estación 6",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Station::E2 => "e2",
            Station::E5 => "e5",
            Station::E6 => "e6",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Station::E2 => 0,
            Station::E5 => 1,
            Station::E6 => 2,
        }
    }

    /// First station whose marker occurs in the uppercased file name.
    pub fn for_file_name(name: &str) -> Option<Station> {
        let upper = name.to_uppercase();
        Station::ALL
            .into_iter()
            .find(|station| upper.contains(station.marker()))
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Uploaded files grouped by station, upload order preserved in each bucket.
#[derive(Clone, Debug, Default)]
pub struct StationBuckets<'a> {
    buckets: [Vec<&'a UploadedFile>; 3],
    unassigned: Vec<&'a UploadedFile>,
}

impl<'a> StationBuckets<'a> {
    pub fn get(&self, station: Station) -> &[&'a UploadedFile] {
        &self.buckets[station.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Station, &[&'a UploadedFile])> + '_ {
        Station::ALL
            .into_iter()
            .map(move |station| (station, self.get(station)))
    }

    pub fn unassigned(&self) -> &[&'a UploadedFile] {
        &self.unassigned
    }

    pub fn assigned_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

pub fn classify_files(files: &[UploadedFile]) -> StationBuckets<'_> {
    let mut buckets = StationBuckets::default();
    for file in files {
        match Station::for_file_name(&file.name) {
            Some(station) => buckets.buckets[station.index()].push(file),
            None => {
                debug!("no station marker in '{}', ignoring", file.name);
                buckets.unassigned.push(file);
            }
        }
    }
    debug!(
        "classified {} of {} files (E2={}, E5={}, E6={})",
        buckets.assigned_count(),
        files.len(),
        buckets.get(Station::E2).len(),
        buckets.get(Station::E5).len(),
        buckets.get(Station::E6).len()
    );
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<UploadedFile> {
        names
            .iter()
            .map(|name| UploadedFile::new(*name, Vec::new()))
            .collect()
    }

    fn names(bucket: &[&UploadedFile]) -> Vec<String> {
        bucket.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn markers_match_case_insensitively() {
        let input = files(&["e2_bomba.csv", "Sensor_E5.csv", "log-e6-norte.csv"]);
        let buckets = classify_files(&input);
        assert_eq!(names(buckets.get(Station::E2)), vec!["e2_bomba.csv"]);
        assert_eq!(names(buckets.get(Station::E5)), vec!["Sensor_E5.csv"]);
        assert_eq!(names(buckets.get(Station::E6)), vec!["log-e6-norte.csv"]);
    }

    #[test]
    fn first_marker_in_priority_order_wins() {
        let input = files(&["E6_E2.csv", "e5e6.csv", "E6-E5-E2.csv"]);
        let buckets = classify_files(&input);
        assert_eq!(names(buckets.get(Station::E2)), vec!["E6_E2.csv", "E6-E5-E2.csv"]);
        assert_eq!(names(buckets.get(Station::E5)), vec!["e5e6.csv"]);
        assert!(buckets.get(Station::E6).is_empty());
        assert_eq!(buckets.assigned_count(), input.len());
    }

    #[test]
    fn unmatched_files_land_in_no_bucket() {
        let input = files(&["planta.csv", "E3.csv", "E2a.csv", "e_2.csv"]);
        let buckets = classify_files(&input);
        assert_eq!(buckets.assigned_count(), 1);
        assert_eq!(names(buckets.unassigned()), vec!["planta.csv", "E3.csv", "e_2.csv"]);
        assert!(buckets.assigned_count() <= input.len());
    }

    #[test]
    fn upload_order_is_kept_within_a_bucket() {
        let input = files(&["E2_c.csv", "E5.csv", "E2_a.csv", "E2_b.csv"]);
        let buckets = classify_files(&input);
        assert_eq!(
            names(buckets.get(Station::E2)),
            vec!["E2_c.csv", "E2_a.csv", "E2_b.csv"]
        );
    }

    #[test]
    fn empty_input_yields_three_empty_buckets() {
        let buckets = classify_files(&[]);
        let stations: Vec<_> = buckets.iter().map(|(s, b)| (s, b.len())).collect();
        assert_eq!(
            stations,
            vec![(Station::E2, 0), (Station::E5, 0), (Station::E6, 0)]
        );
    }

    #[test]
    fn labels_follow_column_order() {
        let labels: Vec<_> = Station::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["Estación 2", "Estación 5", "Estación 6"]);
    }
}
