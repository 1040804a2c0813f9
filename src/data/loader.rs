//! Storm Data Loader Module
//! Handles compressed CSV loading and row extraction using Polars.

use crate::data::RawStormRecord;
use bzip2::read::MultiBzDecoder;
use polars::prelude::*;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const COL_BEGIN_DATE: &str = "BGN_DATE";
pub const COL_STATE: &str = "STATE";
pub const COL_COUNTY_NAME: &str = "COUNTYNAME";
pub const COL_EVENT_TYPE: &str = "EVTYPE";
pub const COL_FATALITIES: &str = "FATALITIES";
pub const COL_INJURIES: &str = "INJURIES";
pub const COL_PROPERTY_DAMAGE: &str = "PROPDMG";
pub const COL_PROPERTY_DAMAGE_UNIT: &str = "PROPDMGEXP";
pub const COL_CROP_DAMAGE: &str = "CROPDMG";
pub const COL_CROP_DAMAGE_UNIT: &str = "CROPDMGEXP";

const STRING_COLUMNS: [&str; 6] = [
    COL_BEGIN_DATE,
    COL_STATE,
    COL_COUNTY_NAME,
    COL_EVENT_TYPE,
    COL_PROPERTY_DAMAGE_UNIT,
    COL_CROP_DAMAGE_UNIT,
];

const NUMERIC_COLUMNS: [&str; 4] = [
    COL_FATALITIES,
    COL_INJURIES,
    COL_PROPERTY_DAMAGE,
    COL_CROP_DAMAGE,
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("No data loaded")]
    NoData,
}

/// Handles storm data loading with Polars.
pub struct DataLoader {
    df: Option<DataFrame>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { df: None }
    }

    /// Load a `.csv.bz2` or plain `.csv` file, keeping only the storm columns.
    pub fn load(&mut self, file_path: &Path) -> Result<&DataFrame, LoaderError> {
        let bytes = Self::read_bytes(file_path)?;
        debug!(bytes = bytes.len(), "decompressed source file");

        // Numeric columns that fail to parse become null and are reported
        // per record rather than failing the whole load.
        let schema = Schema::from_iter(
            STRING_COLUMNS
                .iter()
                .map(|name| Field::new(PlSmallStr::from_static(name), DataType::String))
                .chain(
                    NUMERIC_COLUMNS
                        .iter()
                        .map(|name| Field::new(PlSmallStr::from_static(name), DataType::Float64)),
                ),
        );
        let columns: Arc<[PlSmallStr]> = STRING_COLUMNS
            .iter()
            .chain(NUMERIC_COLUMNS.iter())
            .map(|name| PlSmallStr::from_static(name))
            .collect();

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .with_schema_overwrite(Some(Arc::new(schema)))
            .with_columns(Some(columns))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        info!(
            rows = df.height(),
            path = %file_path.display(),
            "loaded storm data"
        );

        self.df = Some(df);
        self.df.as_ref().ok_or(LoaderError::NoData)
    }

    fn read_bytes(file_path: &Path) -> Result<Vec<u8>, LoaderError> {
        let io_err = |source| LoaderError::Io {
            path: file_path.to_path_buf(),
            source,
        };

        let is_bzip2 = file_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));

        if is_bzip2 {
            let file = File::open(file_path).map_err(io_err)?;
            let mut bytes = Vec::new();
            MultiBzDecoder::new(file)
                .read_to_end(&mut bytes)
                .map_err(io_err)?;
            Ok(bytes)
        } else {
            std::fs::read(file_path).map_err(io_err)
        }
    }

    /// Extract typed raw records from the loaded DataFrame, in file order.
    pub fn records(&self) -> Result<Vec<RawStormRecord>, LoaderError> {
        let df = self.df.as_ref().ok_or(LoaderError::NoData)?;
        Self::records_from_dataframe(df)
    }

    fn records_from_dataframe(df: &DataFrame) -> Result<Vec<RawStormRecord>, LoaderError> {
        let begin_dates = Self::string_values(df, COL_BEGIN_DATE)?;
        let states = Self::string_values(df, COL_STATE)?;
        let counties = Self::string_values(df, COL_COUNTY_NAME)?;
        let event_types = Self::string_values(df, COL_EVENT_TYPE)?;
        let prop_units = Self::string_values(df, COL_PROPERTY_DAMAGE_UNIT)?;
        let crop_units = Self::string_values(df, COL_CROP_DAMAGE_UNIT)?;
        let fatalities = Self::float_values(df, COL_FATALITIES)?;
        let injuries = Self::float_values(df, COL_INJURIES)?;
        let prop_damage = Self::float_values(df, COL_PROPERTY_DAMAGE)?;
        let crop_damage = Self::float_values(df, COL_CROP_DAMAGE)?;

        let records = (0..df.height())
            .map(|i| RawStormRecord {
                begin_date: begin_dates[i].clone(),
                state: states[i].clone(),
                county_name: counties[i].clone(),
                event_type: event_types[i].clone(),
                fatalities: fatalities[i],
                injuries: injuries[i],
                property_damage: prop_damage[i],
                property_damage_unit: prop_units[i].clone(),
                crop_damage: crop_damage[i],
                crop_damage_unit: crop_units[i].clone(),
            })
            .collect();

        Ok(records)
    }

    fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoaderError> {
        let column = df.column(name)?.cast(&DataType::String)?;
        let values = column
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.trim_matches('"').to_string()))
            .collect();
        Ok(values)
    }

    fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        let values = column.f64()?.into_iter().collect();
        Ok(values)
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
\"STATE__\",\"BGN_DATE\",\"STATE\",\"COUNTYNAME\",\"EVTYPE\",\"FATALITIES\",\"INJURIES\",\"PROPDMG\",\"PROPDMGEXP\",\"CROPDMG\",\"CROPDMGEXP\",\"REMARKS\"
1.00,4/18/1950 0:00:00,AL,MOBILE,TORNADO,0.00,15.00,25.00,K,0.00,,\"\"
1.00,1/22/1995 0:00:00,AL,BALDWIN,TSTM WIND,1.00,0.00,10.00,M,2.00,K,\"gusts, then
calm\"
1.00,not a date,AL,BALDWIN,HAIL,,0.00,abc,,0.00,,\"\"
";

    fn write_plain(dir: &Path) -> PathBuf {
        let path = dir.join("storm.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        path
    }

    #[test]
    fn loads_plain_csv_with_selected_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plain(dir.path());

        let mut loader = DataLoader::new();
        let df = loader.load(&path).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 10);
        assert!(df.column("REMARKS").is_err());
        assert_eq!(loader.get_row_count(), 3);
    }

    #[test]
    fn extracts_typed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plain(dir.path());

        let mut loader = DataLoader::new();
        loader.load(&path).unwrap();
        let records = loader.records().unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].begin_date.as_deref(), Some("4/18/1950 0:00:00"));
        assert_eq!(records[0].event_type.as_deref(), Some("TORNADO"));
        assert_eq!(records[0].injuries, Some(15.0));
        assert_eq!(records[0].property_damage_unit.as_deref(), Some("K"));
        assert_eq!(records[1].property_damage, Some(10.0));
        assert_eq!(records[1].crop_damage_unit.as_deref(), Some("K"));
        // missing and unparseable numerics load as null
        assert_eq!(records[2].fatalities, None);
        assert_eq!(records[2].property_damage, None);
    }

    #[test]
    fn loads_bzip2_compressed_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storm.csv.bz2");
        let mut encoder = BzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let mut loader = DataLoader::new();
        assert_eq!(loader.load(&path).unwrap().height(), 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut loader = DataLoader::new();
        let err = loader.load(Path::new("/nonexistent/storm.csv.bz2")).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }));
    }

    #[test]
    fn records_without_load_is_no_data() {
        assert!(matches!(DataLoader::new().records(), Err(LoaderError::NoData)));
    }
}
