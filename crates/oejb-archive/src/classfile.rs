//! Class-file header reading.
//!
//! Only what class loading and bean scanning need is decoded: names, version,
//! flags and the class-level runtime-visible annotations. Member attributes
//! are skipped.

pub type Result<T> = std::result::Result<T, ClassFileError>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClassFileError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid classfile magic: 0x{0:08x}")]
    InvalidMagic(u32),
    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),
    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),
}

/// Decoded header of a class file. Names are binary names (`a.b.C`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassInfo {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<String>,
}

impl ClassInfo {
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_ANNOTATION: u16 = 0x2000;

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFE_BABE {
            return Err(ClassFileError::InvalidMagic(magic));
        }
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = pool.class_name(reader.read_u2()?)?;
        let super_index = reader.read_u2()?;
        let super_class = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(pool.class_name(reader.read_u2()?)?);
        }

        // fields, then methods
        for _ in 0..2 {
            let count = reader.read_u2()?;
            for _ in 0..count {
                reader.skip(6)?;
                skip_attributes(&mut reader)?;
            }
        }

        let mut annotations = Vec::new();
        let attributes_count = reader.read_u2()?;
        for _ in 0..attributes_count {
            let name = pool.utf8(reader.read_u2()?)?;
            let length = reader.read_u4()? as usize;
            let info = reader.read_bytes(length)?;
            if name == "RuntimeVisibleAnnotations" {
                let mut sub = Reader::new(info);
                let count = sub.read_u2()?;
                for _ in 0..count {
                    let descriptor = pool.utf8(sub.read_u2()?)?;
                    annotations.push(descriptor_to_binary(descriptor));
                    skip_annotation_pairs(&mut sub)?;
                }
                if !sub.is_empty() {
                    return Err(ClassFileError::MalformedAttribute("RuntimeVisibleAnnotations"));
                }
            }
        }

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            annotations,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & Self::ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & Self::ACC_ABSTRACT != 0
    }

    pub fn has_annotation(&self, binary_name: &str) -> bool {
        self.annotations.iter().any(|annotation| annotation == binary_name)
    }
}

fn descriptor_to_binary(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(descriptor)
        .replace('/', ".")
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let count = reader.read_u2()?;
    for _ in 0..count {
        reader.skip(2)?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

fn skip_annotation_pairs(reader: &mut Reader<'_>) -> Result<()> {
    let pairs = reader.read_u2()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        skip_element_value(reader)?;
    }
    Ok(())
}

fn skip_element_value(reader: &mut Reader<'_>) -> Result<()> {
    match reader.read_u1()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2),
        b'e' => reader.skip(4),
        b'@' => {
            reader.skip(2)?;
            skip_annotation_pairs(reader)
        }
        b'[' => {
            let count = reader.read_u2()?;
            for _ in 0..count {
                skip_element_value(reader)?;
            }
            Ok(())
        }
        _ => Err(ClassFileError::MalformedAttribute("element_value")),
    }
}

enum Constant {
    Utf8(String),
    Class(u16),
    Other,
}

struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(None);
        while entries.len() < count {
            let tag = reader.read_u1()?;
            let (constant, wide) = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(length)?;
                    (Constant::Utf8(String::from_utf8_lossy(bytes).into_owned()), false)
                }
                7 => (Constant::Class(reader.read_u2()?), false),
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    (Constant::Other, false)
                }
                15 => {
                    reader.skip(3)?;
                    (Constant::Other, false)
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    (Constant::Other, false)
                }
                5 | 6 => {
                    reader.skip(8)?;
                    (Constant::Other, true)
                }
                other => return Err(ClassFileError::InvalidConstantPoolTag(other)),
            };
            entries.push(Some(constant));
            if wide {
                entries.push(None);
            }
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(ClassFileError::InvalidConstantPoolIndex(index))
    }

    fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name_index) => Ok(self.utf8(*name_index)?.replace('/', ".")),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(ClassFileError::UnexpectedEof)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(ClassFileError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_u1(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
