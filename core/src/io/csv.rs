//! Flat CSV exports: shoal table, NASC row, Sv samples, ping track and the
//! per-channel raw metadata and calibration tables.

use crate::math::GeoHelper;
use crate::nasc::NascRow;
use crate::prelude::ProcessingResult;
use crate::shoals::ShoalRecord;
use crate::toolkit::ChannelCalibration;
use crate::volume::AcousticVolume;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SHOAL_COLUMNS: [&str; 24] = [
    "label",
    "frequency",
    "filename",
    "area",
    "bbox.0",
    "bbox.1",
    "bbox.2",
    "bbox.3",
    "centroid.0",
    "centroid.1",
    "Sv_mean",
    "npings",
    "nsamples",
    "corrected_length",
    "mean_range",
    "start_range",
    "end_range",
    "start_time",
    "end_time",
    "start_lat",
    "end_lat",
    "start_lon",
    "end_lon",
    "nasc",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvKind {
    Shoals,
    Nasc,
    Sv,
    Gps,
    Raw,
    Calibration,
}

impl CsvKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            CsvKind::Shoals => "fish_schools",
            CsvKind::Nasc => "NASC",
            CsvKind::Sv => "Sv",
            CsvKind::Gps => "GPS",
            CsvKind::Raw => "metadata",
            CsvKind::Calibration => "calibration",
        }
    }

    /// `<dir>/<stem>_<suffix>.csv`
    pub fn path(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}_{}.csv", stem, self.suffix()))
    }
}

/// Quotes a field when it holds a separator, quote or line break.
pub fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn finite(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

fn write_line<W: Write>(writer: &mut W, fields: &[String]) -> ProcessingResult<()> {
    let escaped: Vec<String> = fields.iter().map(|field| escape(field)).collect();
    writeln!(writer, "{}", escaped.join(","))?;
    Ok(())
}

fn header<W: Write>(writer: &mut W, columns: &[&str]) -> ProcessingResult<()> {
    let fields: Vec<String> = columns.iter().map(|column| column.to_string()).collect();
    write_line(writer, &fields)
}

pub fn write_shoals_csv<W: Write>(writer: &mut W, records: &[ShoalRecord]) -> ProcessingResult<()> {
    header(writer, &SHOAL_COLUMNS)?;
    for record in records {
        let fields = vec![
            opt(&record.label),
            opt(&record.frequency),
            record.filename.clone(),
            opt(&record.area),
            opt(&record.bbox_0),
            opt(&record.bbox_1),
            opt(&record.bbox_2),
            opt(&record.bbox_3),
            opt(&record.centroid_0),
            opt(&record.centroid_1),
            opt(&record.sv_mean),
            opt(&record.npings),
            opt(&record.nsamples),
            opt(&record.corrected_length),
            opt(&record.mean_range),
            opt(&record.start_range),
            opt(&record.end_range),
            record.start_time.as_ref().map(timestamp).unwrap_or_default(),
            record.end_time.as_ref().map(timestamp).unwrap_or_default(),
            opt(&record.start_lat),
            opt(&record.end_lat),
            opt(&record.start_lon),
            opt(&record.end_lon),
            opt(&record.nasc),
        ];
        write_line(writer, &fields)?;
    }
    Ok(())
}

pub fn write_nasc_csv<W: Write>(writer: &mut W, row: &NascRow) -> ProcessingResult<()> {
    let columns: Vec<&str> = row.columns().collect();
    header(writer, &columns)?;
    let values: Vec<String> = row.values().map(ToString::to_string).collect();
    write_line(writer, &values)
}

/// One row per finite Sv sample.
pub fn write_sv_csv<W: Write>(writer: &mut W, volume: &AcousticVolume) -> ProcessingResult<()> {
    header(
        writer,
        &["channel", "frequency_nominal", "ping_time", "range_sample", "Sv"],
    )?;
    let sv = volume.sv()?;
    let times: Vec<String> = volume.ping_time().iter().map(timestamp).collect();
    for ((c, p, r), value) in sv.indexed_iter() {
        if !value.is_finite() {
            continue;
        }
        writeln!(
            writer,
            "{},{},{},{},{}",
            escape(&volume.channels()[c]),
            volume.frequency_nominal()[c],
            times[p],
            volume.range_sample()[r],
            value
        )?;
    }
    Ok(())
}

/// One row per ping with the speed over ground since the previous ping,
/// in knots.
pub fn write_gps_csv<W: Write>(writer: &mut W, volume: &AcousticVolume) -> ProcessingResult<()> {
    header(writer, &["lat", "lon", "dt", "knt"])?;
    let (lat, lon) = volume.track()?;
    let times = volume.ping_time();
    for index in 0..times.len() {
        let knots = if index == 0 {
            f64::NAN
        } else {
            let metres = GeoHelper::haversine_m(lat[index - 1], lon[index - 1], lat[index], lon[index]);
            let seconds = (times[index] - times[index - 1])
                .num_microseconds()
                .map(|micros| micros as f64 * 1e-6)
                .unwrap_or(f64::NAN);
            GeoHelper::meters_to_nmi(metres) / (seconds / 3600.0)
        };
        let fields = vec![
            finite(lat[index]),
            finite(lon[index]),
            timestamp(&times[index]),
            finite(knots),
        ];
        write_line(writer, &fields)?;
    }
    Ok(())
}

/// One row per channel describing where the data came from and what it
/// covers.
pub fn write_raw_metadata_csv<W: Write>(writer: &mut W, volume: &AcousticVolume) -> ProcessingResult<()> {
    header(
        writer,
        &[
            "channel",
            "frequency_nominal",
            "filename",
            "pings",
            "range_samples",
            "start_time",
            "end_time",
        ],
    )?;
    let times = volume.ping_time();
    let start = times.first().map(timestamp).unwrap_or_default();
    let end = times.last().map(timestamp).unwrap_or_default();
    for (channel, frequency) in volume.channels().iter().zip(volume.frequency_nominal()) {
        let fields = vec![
            channel.clone(),
            frequency.to_string(),
            volume.source_filename().to_string(),
            times.len().to_string(),
            volume.range_sample().len().to_string(),
            start.clone(),
            end.clone(),
        ];
        write_line(writer, &fields)?;
    }
    Ok(())
}

pub fn write_calibration_csv<W: Write>(
    writer: &mut W,
    calibration: &[ChannelCalibration],
) -> ProcessingResult<()> {
    header(
        writer,
        &["channel", "frequency_nominal", "pulse_length", "gain_correction", "sa_correction"],
    )?;
    for entry in calibration {
        let fields = vec![
            entry.channel.clone(),
            entry.frequency_nominal.to_string(),
            finite(entry.pulse_length),
            finite(entry.gain_correction),
            finite(entry.sa_correction),
        ];
        write_line(writer, &fields)?;
    }
    Ok(())
}

/// Creates `path` and hands a buffered writer to `body`.
pub fn write_file<F>(path: &Path, body: F) -> ProcessingResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> ProcessingResult<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    body(&mut writer)?;
    writer.flush()?;
    Ok(())
}
