pub mod csv;
pub mod integrity;
pub mod processed;

pub use self::csv::{write_file, write_gps_csv, write_nasc_csv, write_shoals_csv, write_sv_csv, CsvKind};
pub use integrity::{file_finder, file_integrity_checking, FileIntegrity, SonarModel};
pub use processed::{
    read_processed, write_processed, StoreFormat, VolumeSource, VolumeStore, WriteOptions,
};
