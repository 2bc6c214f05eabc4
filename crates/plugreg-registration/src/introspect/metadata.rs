//! Minimal ECMA-335 reader.
//!
//! Walks just enough of a PE image (section table, CLI header, metadata root,
//! `#~` table stream) to read the single row of the Assembly table. Tables
//! that precede it are skipped by computing their row sizes from the row
//! counts and heap-size flags in the stream header.

use sha1::{Digest, Sha1};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("image truncated while reading {0}")]
    Truncated(&'static str),
    #[error("not a PE image")]
    NotPortableExecutable,
    #[error("PE image has no CLI header (not a managed assembly)")]
    NotManaged,
    #[error("metadata {0} stream is missing")]
    MissingStream(&'static str),
    #[error("metadata has no Assembly manifest (module, not assembly)")]
    NoAssemblyManifest,
    #[error("invalid metadata: {0}")]
    Invalid(&'static str),
}

type Result<T> = std::result::Result<T, MetadataError>;

/// Identity read from the Assembly table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    pub name: String,
    pub version: String,
    pub culture: Option<String>,
    pub public_key_token: Option<String>,
}

fn u16_at(data: &[u8], offset: usize, what: &'static str) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(MetadataError::Truncated(what))
}

fn u32_at(data: &[u8], offset: usize, what: &'static str) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(MetadataError::Truncated(what))
}

fn u64_at(data: &[u8], offset: usize, what: &'static str) -> Result<u64> {
    let lo = u32_at(data, offset, what)? as u64;
    let hi = u32_at(data, offset + 4, what)? as u64;
    Ok(lo | (hi << 32))
}

struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

fn rva_to_offset(sections: &[Section], rva: u32) -> Result<usize> {
    let section = sections
        .iter()
        .find(|s| {
            let extent = s.virtual_size.max(s.raw_size);
            rva >= s.virtual_address && rva < s.virtual_address.saturating_add(extent)
        })
        .ok_or(MetadataError::Invalid("RVA outside every section"))?;
    (rva - section.virtual_address)
        .checked_add(section.raw_pointer)
        .map(|offset| offset as usize)
        .ok_or(MetadataError::Invalid("section raw pointer out of range"))
}

/// Reads the assembly identity from a managed PE image.
pub fn read_assembly_identity(image: &[u8]) -> Result<AssemblyIdentity> {
    if image.get(0..2) != Some(b"MZ".as_slice()) {
        return Err(MetadataError::NotPortableExecutable);
    }
    let pe = u32_at(image, 0x3C, "DOS header")? as usize;
    if image.get(pe..pe + 4) != Some(b"PE\0\0".as_slice()) {
        return Err(MetadataError::NotPortableExecutable);
    }

    let section_count = u16_at(image, pe + 6, "COFF header")? as usize;
    let optional_size = u16_at(image, pe + 20, "COFF header")? as usize;
    let optional = pe + 24;
    let data_directories = match u16_at(image, optional, "optional header")? {
        0x10B => optional + 96,
        0x20B => optional + 112,
        _ => return Err(MetadataError::Invalid("unknown optional header magic")),
    };
    let directory_count = u32_at(image, data_directories - 4, "optional header")?;
    if directory_count <= 14 {
        return Err(MetadataError::NotManaged);
    }
    let cli_rva = u32_at(image, data_directories + 14 * 8, "data directories")?;
    if cli_rva == 0 {
        return Err(MetadataError::NotManaged);
    }

    let section_table = optional + optional_size;
    let sections = (0..section_count)
        .map(|i| {
            let at = section_table + i * 40;
            Ok(Section {
                virtual_size: u32_at(image, at + 8, "section table")?,
                virtual_address: u32_at(image, at + 12, "section table")?,
                raw_size: u32_at(image, at + 16, "section table")?,
                raw_pointer: u32_at(image, at + 20, "section table")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cli = rva_to_offset(&sections, cli_rva)?;
    let metadata_rva = u32_at(image, cli + 8, "CLI header")?;
    let metadata = rva_to_offset(&sections, metadata_rva)?;

    let streams = read_stream_headers(image, metadata)?;
    let find = |names: &[&str]| {
        streams
            .iter()
            .find(|s| names.contains(&s.name.as_str()))
            .map(|s| (metadata + s.offset as usize, s.size as usize))
    };
    let (tables, _) = find(&["#~", "#-"]).ok_or(MetadataError::MissingStream("#~"))?;
    let (strings, strings_len) = find(&["#Strings"]).ok_or(MetadataError::MissingStream("#Strings"))?;
    let blobs = find(&["#Blob"]);

    let heaps = Heaps {
        strings: image
            .get(strings..strings + strings_len)
            .ok_or(MetadataError::Truncated("#Strings heap"))?,
        blobs: match blobs {
            Some((offset, len)) => image
                .get(offset..offset + len)
                .ok_or(MetadataError::Truncated("#Blob heap"))?,
            None => &[],
        },
    };

    read_assembly_row(image, tables, &heaps)
}

struct StreamHeader {
    offset: u32,
    size: u32,
    name: String,
}

fn read_stream_headers(image: &[u8], root: usize) -> Result<Vec<StreamHeader>> {
    if u32_at(image, root, "metadata root")? != 0x424A_5342 {
        return Err(MetadataError::Invalid("bad metadata signature"));
    }
    let version_len = u32_at(image, root + 12, "metadata root")? as usize;
    let flags_at = root + 16 + version_len;
    let count = u16_at(image, flags_at + 2, "metadata root")? as usize;

    let mut at = flags_at + 4;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = u32_at(image, at, "stream header")?;
        let size = u32_at(image, at + 4, "stream header")?;
        let name_start = at + 8;
        let name_len = image
            .get(name_start..)
            .and_then(|rest| rest.iter().position(|b| *b == 0))
            .ok_or(MetadataError::Truncated("stream name"))?;
        let name = String::from_utf8_lossy(&image[name_start..name_start + name_len]).into_owned();
        // Name plus terminator, padded to four bytes.
        at = name_start + (name_len + 4) / 4 * 4;
        headers.push(StreamHeader { offset, size, name });
    }
    Ok(headers)
}

struct Heaps<'a> {
    strings: &'a [u8],
    blobs: &'a [u8],
}

impl Heaps<'_> {
    fn string(&self, index: u32) -> Result<String> {
        let start = index as usize;
        let rest = self
            .strings
            .get(start..)
            .ok_or(MetadataError::Truncated("#Strings heap"))?;
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(MetadataError::Truncated("#Strings heap"))?;
        std::str::from_utf8(&rest[..end])
            .map(str::to_string)
            .map_err(|_| MetadataError::Invalid("string heap entry is not UTF-8"))
    }

    fn blob(&self, index: u32) -> Result<&[u8]> {
        let start = index as usize;
        if start == 0 && self.blobs.is_empty() {
            return Ok(&[]);
        }
        let b = |i: usize| {
            self.blobs
                .get(start + i)
                .copied()
                .map(usize::from)
                .ok_or(MetadataError::Truncated("#Blob heap"))
        };
        let first = b(0)?;
        let (len, header) = if first & 0x80 == 0 {
            (first, 1)
        } else if first & 0xC0 == 0x80 {
            (((first & 0x3F) << 8) | b(1)?, 2)
        } else if first & 0xE0 == 0xC0 {
            (
                ((first & 0x1F) << 24) | (b(1)? << 16) | (b(2)? << 8) | b(3)?,
                4,
            )
        } else {
            return Err(MetadataError::Invalid("bad blob length prefix"));
        };
        self.blobs
            .get(start + header..start + header + len)
            .ok_or(MetadataError::Truncated("#Blob heap"))
    }
}

// Table numbers from ECMA-335 II.22.
const MODULE: usize = 0x00;
const TYPE_REF: usize = 0x01;
const TYPE_DEF: usize = 0x02;
const FIELD: usize = 0x04;
const METHOD_DEF: usize = 0x06;
const PARAM: usize = 0x08;
const INTERFACE_IMPL: usize = 0x09;
const MEMBER_REF: usize = 0x0A;
const DECL_SECURITY: usize = 0x0E;
const STAND_ALONE_SIG: usize = 0x11;
const EVENT: usize = 0x14;
const PROPERTY: usize = 0x17;
const MODULE_REF: usize = 0x1A;
const TYPE_SPEC: usize = 0x1B;
const ASSEMBLY: usize = 0x20;
const ASSEMBLY_REF: usize = 0x23;
const FILE: usize = 0x26;
const EXPORTED_TYPE: usize = 0x27;
const MANIFEST_RESOURCE: usize = 0x28;
const GENERIC_PARAM: usize = 0x2A;
const METHOD_SPEC: usize = 0x2B;
const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;

#[derive(Clone, Copy)]
enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    ResolutionScope,
    CustomAttributeType,
}

impl Coded {
    /// Tag width and the tables the index may point into.
    fn spec(self) -> (u32, &'static [usize]) {
        match self {
            Self::TypeDefOrRef => (2, &[TYPE_DEF, TYPE_REF, TYPE_SPEC]),
            Self::HasConstant => (2, &[FIELD, PARAM, PROPERTY]),
            Self::HasCustomAttribute => (
                5,
                &[
                    METHOD_DEF,
                    FIELD,
                    TYPE_REF,
                    TYPE_DEF,
                    PARAM,
                    INTERFACE_IMPL,
                    MEMBER_REF,
                    MODULE,
                    DECL_SECURITY,
                    PROPERTY,
                    EVENT,
                    STAND_ALONE_SIG,
                    MODULE_REF,
                    TYPE_SPEC,
                    ASSEMBLY,
                    ASSEMBLY_REF,
                    FILE,
                    EXPORTED_TYPE,
                    MANIFEST_RESOURCE,
                    GENERIC_PARAM,
                    GENERIC_PARAM_CONSTRAINT,
                    METHOD_SPEC,
                ],
            ),
            Self::HasFieldMarshal => (1, &[FIELD, PARAM]),
            Self::HasDeclSecurity => (2, &[TYPE_DEF, METHOD_DEF, ASSEMBLY]),
            Self::MemberRefParent => (3, &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC]),
            Self::HasSemantics => (1, &[EVENT, PROPERTY]),
            Self::MethodDefOrRef => (1, &[METHOD_DEF, MEMBER_REF]),
            Self::MemberForwarded => (1, &[FIELD, METHOD_DEF]),
            Self::ResolutionScope => (2, &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF]),
            Self::CustomAttributeType => (3, &[METHOD_DEF, MEMBER_REF]),
        }
    }
}

#[derive(Clone, Copy)]
enum Col {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Table(usize),
    Coded(Coded),
}

use Col::{Blob, Guid, Str, Table, U16, U32};

/// Column layouts of tables 0x00..=0x1F, which precede the Assembly table.
const SCHEMA: [&[Col]; ASSEMBLY] = [
    &[U16, Str, Guid, Guid, Guid],
    &[Col::Coded(Coded::ResolutionScope), Str, Str],
    &[U32, Str, Str, Col::Coded(Coded::TypeDefOrRef), Table(FIELD), Table(METHOD_DEF)],
    &[Table(FIELD)],
    &[U16, Str, Blob],
    &[Table(METHOD_DEF)],
    &[U32, U16, U16, Str, Blob, Table(PARAM)],
    &[Table(PARAM)],
    &[U16, U16, Str],
    &[Table(TYPE_DEF), Col::Coded(Coded::TypeDefOrRef)],
    &[Col::Coded(Coded::MemberRefParent), Str, Blob],
    &[U16, Col::Coded(Coded::HasConstant), Blob],
    &[
        Col::Coded(Coded::HasCustomAttribute),
        Col::Coded(Coded::CustomAttributeType),
        Blob,
    ],
    &[Col::Coded(Coded::HasFieldMarshal), Blob],
    &[U16, Col::Coded(Coded::HasDeclSecurity), Blob],
    &[U16, U32, Table(TYPE_DEF)],
    &[U32, Table(FIELD)],
    &[Blob],
    &[Table(TYPE_DEF), Table(EVENT)],
    &[Table(EVENT)],
    &[U16, Str, Col::Coded(Coded::TypeDefOrRef)],
    &[Table(TYPE_DEF), Table(PROPERTY)],
    &[Table(PROPERTY)],
    &[U16, Str, Blob],
    &[U16, Table(METHOD_DEF), Col::Coded(Coded::HasSemantics)],
    &[
        Table(TYPE_DEF),
        Col::Coded(Coded::MethodDefOrRef),
        Col::Coded(Coded::MethodDefOrRef),
    ],
    &[Str],
    &[Blob],
    &[U16, Col::Coded(Coded::MemberForwarded), Str, Table(MODULE_REF)],
    &[U32, Table(FIELD)],
    &[U32, U32],
    &[U32],
];

struct TableLayout {
    rows: [u32; 64],
    wide_strings: bool,
    wide_guids: bool,
    wide_blobs: bool,
}

impl TableLayout {
    fn index_size(wide: bool) -> usize {
        if wide { 4 } else { 2 }
    }

    fn column_size(&self, col: Col) -> usize {
        match col {
            U16 => 2,
            U32 => 4,
            Str => Self::index_size(self.wide_strings),
            Guid => Self::index_size(self.wide_guids),
            Blob => Self::index_size(self.wide_blobs),
            Table(table) => Self::index_size(self.rows[table] >= 1 << 16),
            Col::Coded(coded) => {
                let (bits, tables) = coded.spec();
                let max = tables.iter().map(|t| self.rows[*t]).max().unwrap_or(0);
                Self::index_size(max >= 1 << (16 - bits))
            }
        }
    }

    fn row_size(&self, table: usize) -> usize {
        SCHEMA[table].iter().map(|c| self.column_size(*c)).sum()
    }
}

fn read_assembly_row(image: &[u8], stream: usize, heaps: &Heaps<'_>) -> Result<AssemblyIdentity> {
    let heap_sizes = *image.get(stream + 6).ok_or(MetadataError::Truncated("#~ header"))?;
    let valid = u64_at(image, stream + 8, "#~ header")?;

    let mut layout = TableLayout {
        rows: [0; 64],
        wide_strings: heap_sizes & 0x01 != 0,
        wide_guids: heap_sizes & 0x02 != 0,
        wide_blobs: heap_sizes & 0x04 != 0,
    };
    let mut at = stream + 24;
    for table in 0..64 {
        if valid & (1 << table) != 0 {
            layout.rows[table] = u32_at(image, at, "#~ row counts")?;
            at += 4;
        }
    }
    if heap_sizes & 0x40 != 0 {
        at += 4;
    }

    if layout.rows[ASSEMBLY] == 0 {
        return Err(MetadataError::NoAssemblyManifest);
    }
    for table in 0..ASSEMBLY {
        at += layout.rows[table] as usize * layout.row_size(table);
    }

    let read_index = |at: usize, wide: bool| -> Result<u32> {
        if wide {
            u32_at(image, at, "Assembly row")
        } else {
            u16_at(image, at, "Assembly row").map(u32::from)
        }
    };

    // HashAlgId, four version parts, Flags, PublicKey, Name, Culture.
    let major = u16_at(image, at + 4, "Assembly row")?;
    let minor = u16_at(image, at + 6, "Assembly row")?;
    let build = u16_at(image, at + 8, "Assembly row")?;
    let revision = u16_at(image, at + 10, "Assembly row")?;
    let mut column = at + 16;
    let public_key = read_index(column, layout.wide_blobs)?;
    column += TableLayout::index_size(layout.wide_blobs);
    let name = read_index(column, layout.wide_strings)?;
    column += TableLayout::index_size(layout.wide_strings);
    let culture = read_index(column, layout.wide_strings)?;

    let name = heaps.string(name)?;
    if name.is_empty() {
        return Err(MetadataError::Invalid("assembly name is empty"));
    }
    let culture = heaps.string(culture)?;
    let public_key = heaps.blob(public_key)?;

    Ok(AssemblyIdentity {
        name,
        version: format!("{major}.{minor}.{build}.{revision}"),
        culture: (!culture.is_empty()).then_some(culture),
        public_key_token: (!public_key.is_empty()).then(|| public_key_token(public_key)),
    })
}

/// Last eight bytes of the key's SHA-1 hash, reversed.
fn public_key_token(public_key: &[u8]) -> String {
    let hash = Sha1::digest(public_key);
    let mut token: Vec<u8> = hash[hash.len() - 8..].to_vec();
    token.reverse();
    hex::encode(token)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_rva_past_the_addressable_range() {
        let sections = [Section {
            virtual_address: 0x2000,
            virtual_size: 0x1000,
            raw_size: 0x1000,
            raw_pointer: u32::MAX - 0x10,
        }];
        assert_eq!(rva_to_offset(&sections, 0x2008), Ok(u32::MAX as usize - 0x8));
        assert_eq!(
            rva_to_offset(&sections, 0x2020),
            Err(MetadataError::Invalid("section raw pointer out of range"))
        );
        assert_eq!(
            rva_to_offset(&sections, 0x4000),
            Err(MetadataError::Invalid("RVA outside every section"))
        );
    }

    /// Builds a minimal PE32 image whose metadata holds a Module row and an
    /// Assembly row.
    pub(crate) fn synthetic_assembly(
        name: &str,
        version: [u16; 4],
        culture: &str,
        public_key: &[u8],
    ) -> Vec<u8> {
        // Heaps.
        let mut strings = vec![0u8];
        let module_name = strings.len() as u16;
        strings.extend_from_slice(format!("{name}.dll").as_bytes());
        strings.push(0);
        let name_index = strings.len() as u16;
        strings.extend_from_slice(name.as_bytes());
        strings.push(0);
        let culture_index = if culture.is_empty() {
            0
        } else {
            let at = strings.len() as u16;
            strings.extend_from_slice(culture.as_bytes());
            strings.push(0);
            at
        };
        while strings.len() % 4 != 0 {
            strings.push(0);
        }

        let mut blobs = vec![0u8];
        let key_index = if public_key.is_empty() {
            0
        } else {
            let at = blobs.len() as u16;
            let len = public_key.len();
            if len < 0x80 {
                blobs.push(len as u8);
            } else {
                blobs.push(0x80 | (len >> 8) as u8);
                blobs.push((len & 0xFF) as u8);
            }
            blobs.extend_from_slice(public_key);
            at
        };
        while blobs.len() % 4 != 0 {
            blobs.push(0);
        }

        // #~ stream: Module (0x00) and Assembly (0x20) tables.
        let mut tables = Vec::new();
        tables.extend_from_slice(&0u32.to_le_bytes());
        tables.extend_from_slice(&[2, 0, 0, 1]);
        tables.extend_from_slice(&((1u64 << MODULE) | (1u64 << ASSEMBLY)).to_le_bytes());
        tables.extend_from_slice(&0u64.to_le_bytes());
        tables.extend_from_slice(&1u32.to_le_bytes());
        tables.extend_from_slice(&1u32.to_le_bytes());
        // Module row: Generation, Name, Mvid, EncId, EncBaseId.
        for value in [0u16, module_name, 0, 0, 0] {
            tables.extend_from_slice(&value.to_le_bytes());
        }
        // Assembly row.
        tables.extend_from_slice(&0x8004u32.to_le_bytes());
        for part in version {
            tables.extend_from_slice(&part.to_le_bytes());
        }
        tables.extend_from_slice(&(if public_key.is_empty() { 0u32 } else { 1 }).to_le_bytes());
        for value in [key_index, name_index, culture_index] {
            tables.extend_from_slice(&value.to_le_bytes());
        }
        while tables.len() % 4 != 0 {
            tables.push(0);
        }

        // Metadata root.
        let version_string = b"v4.0.30319\0\0";
        let stream_names: [&[u8]; 3] = [b"#~\0\0", b"#Strings\0\0\0\0", b"#Blob\0\0\0"];
        let headers_len: usize = stream_names.iter().map(|n| 8 + n.len()).sum();
        let root_len = 16 + version_string.len() + 4 + headers_len;
        let mut metadata = Vec::new();
        metadata.extend_from_slice(&0x424A_5342u32.to_le_bytes());
        metadata.extend_from_slice(&1u16.to_le_bytes());
        metadata.extend_from_slice(&1u16.to_le_bytes());
        metadata.extend_from_slice(&0u32.to_le_bytes());
        metadata.extend_from_slice(&(version_string.len() as u32).to_le_bytes());
        metadata.extend_from_slice(version_string);
        metadata.extend_from_slice(&0u16.to_le_bytes());
        metadata.extend_from_slice(&3u16.to_le_bytes());
        let mut offset = root_len;
        for (name, body) in stream_names.iter().zip([&tables, &strings, &blobs]) {
            metadata.extend_from_slice(&(offset as u32).to_le_bytes());
            metadata.extend_from_slice(&(body.len() as u32).to_le_bytes());
            metadata.extend_from_slice(name);
            offset += body.len();
        }
        metadata.extend_from_slice(&tables);
        metadata.extend_from_slice(&strings);
        metadata.extend_from_slice(&blobs);

        // .text section: CLI header at 0x2000, metadata right after it.
        const TEXT_RVA: u32 = 0x2000;
        const TEXT_RAW: usize = 0x200;
        let mut text = vec![0u8; 72];
        text[0..4].copy_from_slice(&72u32.to_le_bytes());
        text[8..12].copy_from_slice(&(TEXT_RVA + 72).to_le_bytes());
        text[12..16].copy_from_slice(&(metadata.len() as u32).to_le_bytes());
        text.extend_from_slice(&metadata);

        let mut image = vec![0u8; TEXT_RAW];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        let pe = 0x80;
        image[pe..pe + 4].copy_from_slice(b"PE\0\0");
        image[pe + 4..pe + 6].copy_from_slice(&0x14Cu16.to_le_bytes());
        image[pe + 6..pe + 8].copy_from_slice(&1u16.to_le_bytes());
        image[pe + 20..pe + 22].copy_from_slice(&0xE0u16.to_le_bytes());
        let optional = pe + 24;
        image[optional..optional + 2].copy_from_slice(&0x10Bu16.to_le_bytes());
        image[optional + 92..optional + 96].copy_from_slice(&16u32.to_le_bytes());
        let cli_dir = optional + 96 + 14 * 8;
        image[cli_dir..cli_dir + 4].copy_from_slice(&TEXT_RVA.to_le_bytes());
        image[cli_dir + 4..cli_dir + 8].copy_from_slice(&72u32.to_le_bytes());
        let section = optional + 0xE0;
        image[section..section + 5].copy_from_slice(b".text");
        image[section + 8..section + 12].copy_from_slice(&(text.len() as u32).to_le_bytes());
        image[section + 12..section + 16].copy_from_slice(&TEXT_RVA.to_le_bytes());
        image[section + 16..section + 20].copy_from_slice(&(text.len() as u32).to_le_bytes());
        image[section + 20..section + 24].copy_from_slice(&(TEXT_RAW as u32).to_le_bytes());
        image.extend_from_slice(&text);
        image
    }

    #[test]
    fn test_reads_identity() {
        let image = synthetic_assembly("Contoso.Plugins", [1, 2, 3, 4], "", &[]);
        let identity = read_assembly_identity(&image).unwrap();
        assert_eq!(identity.name, "Contoso.Plugins");
        assert_eq!(identity.version, "1.2.3.4");
        assert_eq!(identity.culture, None);
        assert_eq!(identity.public_key_token, None);
    }

    #[test]
    fn test_reads_culture_and_token() {
        let key = [7u8; 160];
        let image = synthetic_assembly("Contoso.Resources", [2, 0, 0, 0], "de-DE", &key);
        let identity = read_assembly_identity(&image).unwrap();
        assert_eq!(identity.culture.as_deref(), Some("de-DE"));

        let hash = Sha1::digest(key);
        let expected: Vec<u8> = hash[12..].iter().rev().copied().collect();
        assert_eq!(identity.public_key_token, Some(hex::encode(expected)));
        assert_eq!(identity.public_key_token.unwrap().len(), 16);
    }

    #[test]
    fn test_rejects_non_pe() {
        assert_eq!(
            read_assembly_identity(b"not an assembly").unwrap_err(),
            MetadataError::NotPortableExecutable
        );
    }

    #[test]
    fn test_rejects_native_image() {
        let mut image = synthetic_assembly("Native", [1, 0, 0, 0], "", &[]);
        let cli_dir = 0x80 + 24 + 96 + 14 * 8;
        image[cli_dir..cli_dir + 4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            read_assembly_identity(&image).unwrap_err(),
            MetadataError::NotManaged
        );
    }

    #[test]
    fn test_truncated_image() {
        let image = synthetic_assembly("Contoso.Plugins", [1, 0, 0, 0], "", &[]);
        let err = read_assembly_identity(&image[..0x200 + 80]).unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Truncated(_) | MetadataError::Invalid(_)
        ));
    }
}
