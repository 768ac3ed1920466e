// src/process/mod.rs
pub mod builders;
pub mod row;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1250;
use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};
use tracing::{debug, info, trace};
use zip::{result::ZipError, ZipArchive};

use crate::dataset::Dataset;
use crate::error::DecodeError;
use crate::schema::{Column, Region};
use builders::ColumnBuilders;
use row::{decode_row, FieldError, RowOutcome};

/// Row counters for one region decode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Decode one region from every archive, in the order given.
///
/// Each archive must contain `<number>.csv` for the region. Members are
/// windows-1250 text, `;`-delimited with `"` quoting. Rows with a sentinel in
/// a required numeric column are dropped; any other unrepresentable value
/// fails the whole region.
#[tracing::instrument(level = "info", skip(archives), fields(region = %region, archives = archives.len()))]
pub fn decode_region<P: AsRef<Path>>(
    region: Region,
    archives: &[P],
) -> Result<Dataset, DecodeError> {
    let mut builders = ColumnBuilders::new();
    let mut stats = DecodeStats::default();
    let member = region.member_name();

    for archive in archives {
        let archive = archive.as_ref();
        let text = read_member(archive, &member)?;
        decode_member(archive, &member, &text, &mut builders, &mut stats)?;
    }

    info!(kept = stats.kept, dropped = stats.dropped, "decoded region");
    builders.finish(region)
}

/// Extract `member` from the archive at `path` and decode it to text.
fn read_member(path: &Path, member: &str) -> Result<String, DecodeError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DecodeError::ArchiveUnavailable(path.to_path_buf()),
        _ => DecodeError::Io {
            archive: path.to_path_buf(),
            member: member.to_string(),
            source,
        },
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|source| DecodeError::Archive {
        archive: path.to_path_buf(),
        member: member.to_string(),
        source,
    })?;

    let mut entry = archive.by_name(member).map_err(|source| match source {
        ZipError::FileNotFound => DecodeError::MissingMember {
            archive: path.to_path_buf(),
            member: member.to_string(),
        },
        source => DecodeError::Archive {
            archive: path.to_path_buf(),
            member: member.to_string(),
            source,
        },
    })?;

    let mut buf = Vec::with_capacity(capacity_hint(entry.size()));
    entry.read_to_end(&mut buf).map_err(|source| DecodeError::Io {
        archive: path.to_path_buf(),
        member: member.to_string(),
        source,
    })?;

    let (text, had_errors) = WINDOWS_1250.decode_without_bom_handling(&buf);
    if had_errors {
        debug!(archive = %path.display(), member, "unmappable bytes replaced while decoding");
    }
    Ok(text.into_owned())
}

/// Upper bound on the buffer reserved up front for one member.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Initial buffer size for a member whose header declares `declared` bytes.
/// The header is not trusted past `MAX_PREALLOC`; `read_to_end` grows the
/// buffer as real data arrives.
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

fn decode_member(
    archive: &Path,
    member: &str,
    text: &str,
    builders: &mut ColumnBuilders,
    stats: &mut DecodeStats,
) -> Result<(), DecodeError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let before = *stats;
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| DecodeError::Csv {
            archive: archive.to_path_buf(),
            member: member.to_string(),
            record: idx,
            source,
        })?;

        if record.len() < Column::ALL.len() {
            return Err(DecodeError::ShortRow {
                archive: archive.to_path_buf(),
                member: member.to_string(),
                record: idx,
                expected: Column::ALL.len(),
                found: record.len(),
            });
        }

        match decode_row(&record) {
            Ok(RowOutcome::Keep(values)) => {
                builders.push_row(values);
                stats.kept += 1;
            }
            Ok(RowOutcome::Drop(violation)) => {
                trace!(record = idx, column = %violation.column, raw = %violation.raw, "dropping row");
                stats.dropped += 1;
            }
            Err(FieldError::Overflow { column, value }) => {
                return Err(DecodeError::Overflow {
                    archive: archive.to_path_buf(),
                    member: member.to_string(),
                    record: idx,
                    column,
                    value,
                });
            }
            Err(FieldError::Invalid { column, value }) => {
                return Err(DecodeError::InvalidValue {
                    archive: archive.to_path_buf(),
                    member: member.to_string(),
                    record: idx,
                    column,
                    value,
                });
            }
        }
    }

    debug!(
        archive = %archive.display(),
        member,
        kept = stats.kept - before.kept,
        dropped = stats.dropped - before.dropped,
        "decoded member"
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use anyhow::Result;
    use arrow::array::Array;
    use std::io::{Cursor, Write};
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    pub(crate) fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,nehody=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// One quoted, `;`-separated source line. Every field gets a valid
    /// default unless overridden.
    pub(crate) fn source_row(id: u64, overrides: &[(Column, &str)]) -> String {
        Column::ALL
            .iter()
            .map(|c| {
                let raw = match overrides.iter().find(|(o, _)| o == c) {
                    Some((_, v)) => v.to_string(),
                    None => match (c, c.ty()) {
                        (Column::P1, _) => id.to_string(),
                        (Column::P2a, _) => "2016-01-01".to_string(),
                        (_, ColumnType::Utf8) => "Pražská".to_string(),
                        (_, ColumnType::Float64) => "1234,56".to_string(),
                        _ => "1".to_string(),
                    },
                };
                format!("\"{raw}\"")
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Write a ZIP holding `members` (name, lines) as windows-1250 text.
    pub(crate) fn write_archive(path: &Path, members: &[(&str, Vec<String>)]) -> Result<()> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, lines) in members {
                let text: String = lines.iter().map(|l| format!("{l}\r\n")).collect();
                let (bytes, _, _) = WINDOWS_1250.encode(&text);
                zip.start_file(*name, options)?;
                zip.write_all(&bytes)?;
            }
            zip.finish()?;
        }
        std::fs::write(path, &buf)?;
        Ok(())
    }

    fn archive_in(dir: &TempDir, name: &str, members: &[(&str, Vec<String>)]) -> Result<PathBuf> {
        let path = dir.path().join(name);
        write_archive(&path, members)?;
        Ok(path)
    }

    #[test]
    fn invalid_row_is_dropped_and_region_is_tagged() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let zip = archive_in(
            &dir,
            "2016.zip",
            &[(
                "02.csv",
                vec![source_row(1, &[]), source_row(2, &[(Column::P13a, "")])],
            )],
        )?;

        let data = decode_region(Region::Jhc, &[zip])?;
        assert_eq!(data.num_rows(), 1);
        assert_eq!(data.u64_column(Column::P1).unwrap().value(0), 1);
        assert_eq!(data.regions().value(0), "JHC");
        Ok(())
    }

    #[test]
    fn coordinates_use_decimal_comma_and_may_be_missing() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(
            &dir,
            "2017.zip",
            &[(
                "02.csv",
                vec![
                    source_row(1, &[(Column::D, "1234,56")]),
                    source_row(2, &[(Column::D, "XX"), (Column::E, "")]),
                ],
            )],
        )?;

        let data = decode_region(Region::Jhc, &[zip])?;
        assert_eq!(data.num_rows(), 2);
        let d = data.f64_column(Column::D).unwrap();
        assert_eq!(d.value(0), 1234.56);
        assert!(d.is_null(1));
        assert!(data.f64_column(Column::E).unwrap().is_null(1));
        Ok(())
    }

    #[test]
    fn legacy_encoding_and_quoted_delimiters_survive() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(
            &dir,
            "2018.zip",
            &[("00.csv", vec![source_row(5, &[(Column::H, "Šumava; Žďár")])])],
        )?;

        let data = decode_region(Region::Pha, &[zip])?;
        assert_eq!(data.str_column(Column::H).unwrap().value(0), "Šumava; Žďár");
        assert_eq!(data.str_column(Column::I).unwrap().value(0), "Pražská");
        Ok(())
    }

    #[test]
    fn rows_follow_archive_order_then_file_order() -> Result<()> {
        let dir = TempDir::new()?;
        let first = archive_in(
            &dir,
            "a.zip",
            &[("19.csv", vec![source_row(10, &[]), source_row(11, &[])])],
        )?;
        let second = archive_in(&dir, "b.zip", &[("19.csv", vec![source_row(3, &[])])])?;

        let data = decode_region(Region::Kvk, &[&second, &first])?;
        assert_eq!(
            &data.u64_column(Column::P1).unwrap().values()[..],
            &[3, 10, 11]
        );
        Ok(())
    }

    #[test]
    fn every_column_has_the_same_length() -> Result<()> {
        let dir = TempDir::new()?;
        let rows = (0..20)
            .map(|i| {
                if i % 3 == 0 {
                    source_row(i, &[(Column::P5a, "XX")])
                } else {
                    source_row(i, &[])
                }
            })
            .collect();
        let zip = archive_in(&dir, "2019.zip", &[("06.csv", rows)])?;

        let data = decode_region(Region::Jhm, &[zip])?;
        assert_eq!(data.num_rows(), 13);
        for column in data.batch().columns() {
            assert_eq!(column.len(), 13);
        }
        Ok(())
    }

    #[test]
    fn overflow_fails_the_region() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(
            &dir,
            "2020.zip",
            &[("02.csv", vec![source_row(1, &[(Column::WeekdayP2a, "300")])])],
        )?;

        let err = decode_region(Region::Jhc, &[zip]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Overflow {
                column: Column::WeekdayP2a,
                record: 0,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn missing_member_and_missing_archive_are_distinct() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(&dir, "2021.zip", &[("00.csv", vec![source_row(1, &[])])])?;

        let err = decode_region(Region::Jhc, &[&zip]).unwrap_err();
        assert!(matches!(err, DecodeError::MissingMember { ref member, .. } if member == "02.csv"));

        let err = decode_region(Region::Pha, &[dir.path().join("absent.zip")]).unwrap_err();
        assert!(matches!(err, DecodeError::ArchiveUnavailable(_)));
        Ok(())
    }

    #[test]
    fn short_row_fails_the_region() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(&dir, "2022.zip", &[("02.csv", vec!["\"1\";\"2\"".to_string()])])?;

        let err = decode_region(Region::Jhc, &[zip]).unwrap_err();
        assert!(matches!(err, DecodeError::ShortRow { found: 2, .. }));
        Ok(())
    }

    #[test]
    fn empty_member_is_a_valid_empty_region() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(&dir, "2023.zip", &[("02.csv", vec![])])?;

        let data = decode_region(Region::Jhc, &[zip])?;
        assert!(data.is_empty());
        assert_eq!(data.num_columns(), 65);
        Ok(())
    }

    #[test]
    fn declared_member_size_only_bounds_the_reservation() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(4096), 4096);
        assert_eq!(capacity_hint(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn decode_is_deterministic() -> Result<()> {
        let dir = TempDir::new()?;
        let zip = archive_in(
            &dir,
            "2016.zip",
            &[("16.csv", (0..5).map(|i| source_row(i, &[])).collect())],
        )?;

        let a = decode_region(Region::Vys, &[&zip])?;
        let b = decode_region(Region::Vys, &[&zip])?;
        assert_eq!(a, b);
        Ok(())
    }
}
