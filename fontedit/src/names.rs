//! Access to the [name](https://learn.microsoft.com/en-us/typography/opentype/spec/name) records
//! the pipeline repairs.

use write_fonts::{
    read::{
        tables::name::{Encoding, MacRomanMapping},
        TopLevelTable,
    },
    tables::name::{Name, NameRecord},
    types::NameId,
};

use crate::{error::Error, font::EditableFont};

const WINDOWS: u16 = 3;
const WINDOWS_UNICODE_BMP: u16 = 1;
const WINDOWS_ENGLISH_US: u16 = 0x409;
const MAC: u16 = 1;

/// Lower is preferred when several records carry the same name id.
fn preference(record: &NameRecord) -> Option<u8> {
    match (
        record.platform_id,
        Encoding::new(record.platform_id, record.encoding_id),
    ) {
        (WINDOWS, Encoding::Utf16Be) if record.language_id == WINDOWS_ENGLISH_US => Some(0),
        (_, Encoding::Utf16Be) => Some(1),
        (_, Encoding::MacRoman) => Some(2),
        _ => None,
    }
}

fn mac_roman_representable(value: &str) -> bool {
    value.chars().all(|c| MacRomanMapping.encode(c).is_some())
}

/// The name table as it will be written: records that cannot be encoded
/// are dropped and the remainder sorted, one record per key.
pub(crate) fn compile(name: &Name) -> Name {
    let mut records = name
        .name_record
        .iter()
        .filter(|record| match Encoding::new(record.platform_id, record.encoding_id) {
            Encoding::Unknown => false,
            Encoding::MacRoman => mac_roman_representable(record.string.as_str()),
            Encoding::Utf16Be => true,
        })
        .cloned()
        .collect::<Vec<_>>();
    records.sort();
    records.dedup_by_key(|r| (r.platform_id, r.encoding_id, r.language_id, r.name_id));
    let mut compiled = Name::new(records);
    compiled.lang_tag_record = name.lang_tag_record.clone();
    compiled
}

impl EditableFont {
    /// The best available record for `name_id`.
    pub fn name_string(&self, name_id: NameId) -> Option<String> {
        self.name
            .as_ref()?
            .name_record
            .iter()
            .filter(|record| record.name_id == name_id)
            .filter_map(|record| preference(record).map(|p| (p, record)))
            .min_by_key(|(p, _)| *p)
            .map(|(_, record)| record.string.as_str().to_string())
    }

    /// Replace every record for `name_id` with `value`.
    ///
    /// Mac Roman records are removed when `value` can't be represented in
    /// that encoding. A Windows English record is added if there isn't one.
    pub fn set_name_string(&mut self, name_id: NameId, value: &str) -> Result<(), Error> {
        if value.trim().is_empty() {
            return Err(Error::InvalidName {
                name_id,
                value: value.to_string(),
            });
        }
        let mac_ok = mac_roman_representable(value);
        let name = self.name.get_or_insert_with(Name::default);
        name.name_record.retain(|record| {
            record.name_id != name_id || record.platform_id != MAC || mac_ok
        });
        let mut has_windows_english = false;
        for record in name
            .name_record
            .iter_mut()
            .filter(|record| record.name_id == name_id)
        {
            has_windows_english |= record.platform_id == WINDOWS
                && record.encoding_id == WINDOWS_UNICODE_BMP
                && record.language_id == WINDOWS_ENGLISH_US;
            record.string = value.to_string().into();
        }
        if !has_windows_english {
            name.name_record.push(NameRecord::new(
                WINDOWS,
                WINDOWS_UNICODE_BMP,
                WINDOWS_ENGLISH_US,
                name_id,
                value.to_string().into(),
            ));
        }
        name.name_record.sort();
        self.touch(Name::TAG);
        Ok(())
    }

    /// The PostScript name, name id 6.
    pub fn fontname(&self) -> Option<String> {
        self.name_string(NameId::POSTSCRIPT_NAME)
    }

    /// The full name, name id 4.
    pub fn fullname(&self) -> Option<String> {
        self.name_string(NameId::FULL_NAME)
    }

    /// The family name, name id 1.
    pub fn familyname(&self) -> Option<String> {
        self.name_string(NameId::FAMILY_NAME)
    }

    pub fn set_fontname(&mut self, value: &str) -> Result<(), Error> {
        self.set_name_string(NameId::POSTSCRIPT_NAME, value)
    }

    pub fn set_fullname(&mut self, value: &str) -> Result<(), Error> {
        self.set_name_string(NameId::FULL_NAME, value)
    }

    pub fn set_familyname(&mut self, value: &str) -> Result<(), Error> {
        self.set_name_string(NameId::FAMILY_NAME, value)
    }
}
