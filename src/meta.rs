use std::{fs, io::BufReader, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};

use crate::media::GeoLocation;

/// Capture details read from an image's EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMeta {
    pub captured_at: Option<NaiveDateTime>,
    pub location: Option<GeoLocation>,
}

/// Best effort: files without EXIF (or unreadable ones) yield empty metadata.
pub fn read_capture_meta(path: &Path) -> CaptureMeta {
    let Some(exif) = read_exif(path) else {
        return CaptureMeta::default();
    };
    CaptureMeta {
        captured_at: captured_at(&exif),
        location: location(&exif),
    }
}

fn read_exif(path: &Path) -> Option<Exif> {
    let f = fs::File::open(path).ok()?;
    let mut buf = BufReader::new(f);
    exif::Reader::new().read_from_container(&mut buf).ok()
}

fn captured_at(exif: &Exif) -> Option<NaiveDateTime> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;
    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;
    NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(
            u32::from(dt.hour),
            u32::from(dt.minute),
            u32::from(dt.second),
        )
}

fn location(exif: &Exif) -> Option<GeoLocation> {
    let latitude = signed_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some(GeoLocation {
        latitude,
        longitude,
        placename: None,
    })
}

fn signed_degrees(exif: &Exif, value: Tag, reference: Tag, negative: u8) -> Option<f64> {
    let field = exif.get_field(value, In::PRIMARY)?;
    let degrees = match &field.value {
        Value::Rational(dms) if dms.len() >= 3 => {
            dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    let hemisphere = exif
        .get_field(reference, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(parts) => parts.first().and_then(|s| s.first().copied()),
            _ => None,
        });
    if hemisphere.map(|c| c.to_ascii_uppercase()) == Some(negative) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}
