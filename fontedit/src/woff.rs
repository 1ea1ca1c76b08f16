//! [WOFF 1.0](https://www.w3.org/TR/WOFF/) packaging.
//!
//! Each table is zlib compressed. A table that doesn't get smaller is stored
//! as is, which readers recognize by `compLength == origLength`.

use std::{borrow::Cow, io::Write};

use flate2::{write::ZlibEncoder, Compression};
use write_fonts::{read::FontRef, types::Tag};

use crate::error::Error;

const SIGNATURE: Tag = Tag::new(b"wOFF");
const HEADER_LEN: usize = 44;
const DIRECTORY_ENTRY_LEN: usize = 20;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_RECORD_LEN: usize = 16;

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// A table as it will be written to the container.
struct Entry<'a> {
    tag: Tag,
    checksum: u32,
    orig_length: usize,
    data: Cow<'a, [u8]>,
}

fn compress(tag: Tag, data: &[u8]) -> Result<Option<Vec<u8>>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|source| Error::Compress { table: tag, source })?;
    let compressed = encoder
        .finish()
        .map_err(|source| Error::Compress { table: tag, source })?;
    Ok((compressed.len() < data.len()).then_some(compressed))
}

/// Wrap a single sfnt in a WOFF container.
pub(crate) fn wrap(sfnt: &[u8]) -> Result<Vec<u8>, Error> {
    let font = FontRef::new(sfnt)?;
    let mut records = font.table_directory.table_records().to_vec();
    records.sort_by_key(|record| record.tag());

    let mut tables = Vec::with_capacity(records.len());
    for record in records.iter() {
        let tag = record.tag();
        let data = font
            .table_data(tag)
            .ok_or(Error::MissingTable(tag))?
            .as_bytes();
        let data: Cow<[u8]> = match compress(tag, data)? {
            Some(compressed) => compressed.into(),
            None => data.into(),
        };
        tables.push(Entry {
            tag,
            checksum: record.checksum(),
            orig_length: record.length() as usize,
            data,
        });
    }

    let num_tables = tables.len();
    let total_sfnt_size = SFNT_HEADER_LEN
        + SFNT_RECORD_LEN * num_tables
        + tables
            .iter()
            .map(|table| padded(table.orig_length))
            .sum::<usize>();
    let data_start = HEADER_LEN + DIRECTORY_ENTRY_LEN * num_tables;
    let length = data_start
        + tables
            .iter()
            .map(|table| padded(table.data.len()))
            .sum::<usize>();

    let mut woff = Vec::with_capacity(length);
    woff.extend_from_slice(&SIGNATURE.to_be_bytes());
    push_u32(&mut woff, font.table_directory.sfnt_version());
    push_u32(&mut woff, length as u32);
    push_u16(&mut woff, num_tables as u16);
    push_u16(&mut woff, 0); // reserved
    push_u32(&mut woff, total_sfnt_size as u32);
    push_u16(&mut woff, 1); // major version
    push_u16(&mut woff, 0); // minor version
    // no metadata or private data blocks
    for _ in 0..5 {
        push_u32(&mut woff, 0);
    }

    let mut offset = data_start;
    for table in tables.iter() {
        woff.extend_from_slice(&table.tag.to_be_bytes());
        push_u32(&mut woff, offset as u32);
        push_u32(&mut woff, table.data.len() as u32);
        push_u32(&mut woff, table.orig_length as u32);
        push_u32(&mut woff, table.checksum);
        offset += padded(table.data.len());
    }
    for table in tables.iter() {
        woff.extend_from_slice(&table.data);
        woff.resize(padded(woff.len()), 0);
    }
    debug_assert_eq!(length, woff.len());
    Ok(woff)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;
    use pretty_assertions::assert_eq;

    use write_fonts::types::NameId;

    use super::*;
    use crate::EditableFont;

    fn u32_at(data: &[u8], pos: usize) -> u32 {
        u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap())
    }

    fn u16_at(data: &[u8], pos: usize) -> u16 {
        u16::from_be_bytes(data[pos..pos + 2].try_into().unwrap())
    }

    #[test]
    fn header_describes_the_container() {
        let sfnt = test_fonts::basic();
        let font = FontRef::new(&sfnt).unwrap();
        let woff = wrap(&sfnt).unwrap();

        assert_eq!(b"wOFF", &woff[0..4]);
        assert_eq!(0x00010000, u32_at(&woff, 4));
        assert_eq!(woff.len() as u32, u32_at(&woff, 8));
        assert_eq!(font.table_directory.num_tables(), u16_at(&woff, 12));
        assert_eq!(0, woff.len() % 4);
    }

    #[test]
    fn woff_is_smaller_than_the_font() {
        let mut font = EditableFont::from_bytes(test_fonts::basic()).unwrap();
        font.set_name_string(
            NameId::LICENSE_DESCRIPTION,
            &"This Font Software is licensed under the SIL Open Font License, Version 1.1. "
                .repeat(8),
        )
        .unwrap();
        let sfnt = font.to_bytes().unwrap();
        let woff = wrap(&sfnt).unwrap();
        assert!(woff.len() < sfnt.len(), "{} >= {}", woff.len(), sfnt.len());
    }

    #[test]
    fn tables_inflate_to_the_original() {
        let sfnt = test_fonts::basic();
        let font = FontRef::new(&sfnt).unwrap();
        let woff = wrap(&sfnt).unwrap();

        let num_tables = u16_at(&woff, 12) as usize;
        let mut tags = Vec::new();
        let mut compressed = 0;
        for i in 0..num_tables {
            let entry = HEADER_LEN + i * DIRECTORY_ENTRY_LEN;
            let tag = Tag::new_checked(&woff[entry..entry + 4]).unwrap();
            let offset = u32_at(&woff, entry + 4) as usize;
            let comp_length = u32_at(&woff, entry + 8) as usize;
            let orig_length = u32_at(&woff, entry + 12) as usize;
            assert_eq!(0, offset % 4, "{tag} is misaligned");
            assert!(comp_length <= orig_length, "{tag}");

            let stored = &woff[offset..offset + comp_length];
            let table = if comp_length == orig_length {
                stored.to_vec()
            } else {
                compressed += 1;
                let mut inflated = Vec::new();
                ZlibDecoder::new(stored)
                    .read_to_end(&mut inflated)
                    .unwrap();
                inflated
            };
            assert_eq!(font.table_data(tag).unwrap().as_bytes(), &table, "{tag}");
            tags.push(tag);
        }
        assert!(compressed > 0);
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(sorted, tags);
    }

    #[test]
    fn incompressible_tables_are_stored() {
        let tag = Tag::new(b"test");
        assert_eq!(None, compress(tag, &[0x42]).unwrap());
        let zeros = vec![0u8; 512];
        assert!(compress(tag, &zeros).unwrap().unwrap().len() < zeros.len());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(wrap(b"not a font").is_err());
    }
}
