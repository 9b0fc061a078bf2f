//! Registry of named example datasets.

use std::fmt;

/// How a downloaded payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Written as-is
    File,
    Zip,
    Tar,
    TarGz,
}

impl DataKind {
    /// Kind implied by a file name's extension; anything unrecognised is a plain file
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            DataKind::TarGz
        } else if lower.ends_with(".tar") {
            DataKind::Tar
        } else if lower.ends_with(".zip") {
            DataKind::Zip
        } else {
            DataKind::File
        }
    }

    /// Strip the archive extension so the extraction directory gets a clean
    /// name. Plain files keep their extension.
    pub fn strip_extension<'a>(&self, name: &'a str) -> &'a str {
        let suffixes: &[&str] = match self {
            DataKind::File => &[],
            DataKind::Zip => &[".zip"],
            DataKind::Tar => &[".tar"],
            DataKind::TarGz => &[".tar.gz", ".tgz"],
        };
        suffixes
            .iter()
            .find_map(|s| {
                let cut = name.len().checked_sub(s.len())?;
                name.get(cut..)
                    .filter(|tail| tail.eq_ignore_ascii_case(s))
                    .map(|_| &name[..cut])
            })
            .unwrap_or(name)
    }

    pub fn is_archive(&self) -> bool {
        !matches!(self, DataKind::File)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataKind::File => "file",
            DataKind::Zip => "zip",
            DataKind::Tar => "tar",
            DataKind::TarGz => "tar.gz",
        };
        f.write_str(s)
    }
}

/// One download belonging to a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEntry {
    pub url: &'static str,
    /// Target name inside the dataset directory; `"."` is the directory itself
    pub name: &'static str,
    pub kind: DataKind,
}

const fn entry(url: &'static str, name: &'static str, kind: DataKind) -> DataEntry {
    DataEntry { url, name, kind }
}

static DATASETS: &[(&str, &[DataEntry])] = &[
    (
        "california-rim-fire",
        &[entry("https://ndownloader.figshare.com/files/14419310", ".", DataKind::Zip)],
    ),
    (
        "co-flood-extras",
        &[
            entry("https://ndownloader.figshare.com/files/7010681", "boulder-precip.csv", DataKind::File),
            entry("https://ndownloader.figshare.com/files/7010681", "temperature_example.csv", DataKind::File),
        ],
    ),
    (
        "cold-springs-fire",
        &[entry("https://ndownloader.figshare.com/files/10960109", ".", DataKind::Zip)],
    ),
    (
        "cold-springs-landsat-scenes",
        &[entry("https://ndownloader.figshare.com/files/21941085", ".", DataKind::Zip)],
    ),
    (
        "cold-springs-modis-h4",
        &[entry("https://ndownloader.figshare.com/files/10960112", ".", DataKind::Zip)],
    ),
    (
        "colorado-flood",
        &[entry("https://ndownloader.figshare.com/files/16371473", ".", DataKind::Zip)],
    ),
    (
        "cs-test-landsat",
        &[entry(
            "https://ndownloader.figshare.com/files/10960214?private_link=fbba903d00e1848b423e",
            ".",
            DataKind::Zip,
        )],
    ),
    (
        "cs-test-naip",
        &[entry(
            "https://ndownloader.figshare.com/files/10960211?private_link=18f892d9f3645344b2fe",
            ".",
            DataKind::Zip,
        )],
    ),
    (
        "naip-fire-crop",
        &[entry("https://ndownloader.figshare.com/files/23070791", ".", DataKind::Zip)],
    ),
    (
        "ndvi-automation",
        &[entry("https://ndownloader.figshare.com/files/13431344", ".", DataKind::Zip)],
    ),
    (
        "spatial-vector-lidar",
        &[entry("https://ndownloader.figshare.com/files/12459464", ".", DataKind::Zip)],
    ),
    (
        "twitter-flood",
        &[entry(
            "https://ndownloader.figshare.com/files/10960175",
            "boulder_flood_geolocated_tweets.json",
            DataKind::File,
        )],
    ),
    (
        "vignette-elevation",
        &[entry("https://ndownloader.figshare.com/articles/8259098/versions/2", ".", DataKind::Zip)],
    ),
    (
        "vignette-landsat",
        &[entry("https://ndownloader.figshare.com/files/15197339", ".", DataKind::Zip)],
    ),
];

/// Entries of a named dataset
pub fn lookup(key: &str) -> Option<&'static [DataEntry]> {
    DATASETS.iter().find(|(k, _)| *k == key).map(|(_, e)| *e)
}

/// Every dataset key, sorted
pub fn keys() -> Vec<&'static str> {
    let mut keys: Vec<_> = DATASETS.iter().map(|(k, _)| *k).collect();
    keys.sort_unstable();
    keys
}
