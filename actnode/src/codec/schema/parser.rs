//! Parser for the DSDL subset the node needs
//!
//! Recognized: primitive fields with optional cast mode, `voidN` padding, references to
//! other composites, constants, comments, `@sealed`, `@extent` and `@deprecated`.
//! Arrays and `@union` are rejected.

use heapless::{String, Vec};

use super::{SchemaError, definitions};

/// Maximum number of fields in a composite
pub const MAX_FIELDS: usize = 8;

const MAX_NAME_LENGTH: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastMode {
    Saturated,
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Unsigned(u8),
    Signed(u8),
    Float(u8),
}

impl Primitive {
    pub const fn bits(self) -> u8 {
        match self {
            Primitive::Bool => 1,
            Primitive::Unsigned(bits) | Primitive::Signed(bits) | Primitive::Float(bits) => bits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive, CastMode),
    Void(u8),
    /// Full name of the nested type
    Composite(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Empty for padding
    pub name: &'static str,
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub fields: Vec<Field, MAX_FIELDS>,
    /// `None` for sealed types
    pub extent_bits: Option<usize>,
}

pub fn parse(name: &'static str, source: &'static str) -> Result<Definition, SchemaError> {
    let mut fields = Vec::new();
    let mut sealed = false;
    let mut extent_bits = None;

    for line in source.lines() {
        let line = match line.split_once('#') {
            Some((content, _comment)) => content,
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        if let Some(directive) = line.strip_prefix('@') {
            let (keyword, argument) = directive
                .split_once(char::is_whitespace)
                .unwrap_or((directive, ""));
            match keyword {
                "sealed" if argument.is_empty() => sealed = true,
                "extent" => extent_bits = Some(parse_product(argument)?),
                "deprecated" => {}
                "union" => return Err(SchemaError::Unsupported),
                _ => return Err(SchemaError::Syntax),
            }
            continue;
        }

        if line.contains('[') {
            return Err(SchemaError::Unsupported);
        }

        if line.contains('=') {
            // Constants occupy no space in the serialized form.
            let (declaration, _value) = line.split_once('=').ok_or(SchemaError::Syntax)?;
            let mut tokens = declaration.split_whitespace();
            let ty = tokens.next().ok_or(SchemaError::Syntax)?;
            parse_primitive(ty)?.ok_or(SchemaError::Syntax)?;
            continue;
        }

        let field = parse_field(name, line)?;
        fields
            .push(field)
            .map_err(|_| SchemaError::CapacityExceeded)?;
    }

    match (sealed, extent_bits) {
        (true, None) | (false, Some(_)) => {}
        _ => return Err(SchemaError::Syntax),
    }
    if let Some(extent) = extent_bits
        && extent % 8 != 0
    {
        return Err(SchemaError::Syntax);
    }

    Ok(Definition {
        name,
        fields,
        extent_bits,
    })
}

fn parse_field(owner: &str, line: &'static str) -> Result<Field, SchemaError> {
    let mut tokens = line.split_whitespace();
    let mut token = tokens.next().ok_or(SchemaError::Syntax)?;
    let cast = match token {
        "saturated" => Some(CastMode::Saturated),
        "truncated" => Some(CastMode::Truncated),
        _ => None,
    };
    if cast.is_some() {
        token = tokens.next().ok_or(SchemaError::Syntax)?;
    }
    let field = if let Some(bits) = token.strip_prefix("void") {
        if cast.is_some() {
            return Err(SchemaError::Syntax);
        }
        let bits = parse_bits(bits, 1)?;
        Field {
            name: "",
            ty: FieldType::Void(bits),
        }
    } else {
        let name = tokens.next().ok_or(SchemaError::Syntax)?;
        if !is_identifier(name) {
            return Err(SchemaError::Syntax);
        }
        let ty = match parse_primitive(token)? {
            Some(primitive) => {
                FieldType::Primitive(primitive, cast.unwrap_or(CastMode::Saturated))
            }
            None if cast.is_some() => return Err(SchemaError::Syntax),
            None => FieldType::Composite(resolve_reference(owner, token)?),
        };
        Field { name, ty }
    };

    if tokens.next().is_some() {
        return Err(SchemaError::Syntax);
    }
    Ok(field)
}

/// Returns `Ok(None)` for tokens that are not primitive type names.
fn parse_primitive(token: &str) -> Result<Option<Primitive>, SchemaError> {
    let primitive = if token == "bool" {
        Primitive::Bool
    } else if let Some(bits) = token.strip_prefix("uint") {
        Primitive::Unsigned(parse_bits(bits, 1)?)
    } else if let Some(bits) = token.strip_prefix("int") {
        Primitive::Signed(parse_bits(bits, 2)?)
    } else if let Some(bits) = token.strip_prefix("float") {
        match bits {
            "16" => Primitive::Float(16),
            "32" => Primitive::Float(32),
            "64" => Primitive::Float(64),
            _ => return Err(SchemaError::Syntax),
        }
    } else {
        return Ok(None);
    };
    Ok(Some(primitive))
}

fn parse_bits(text: &str, min: u8) -> Result<u8, SchemaError> {
    match text.parse::<u8>() {
        Ok(bits) if (min..=64).contains(&bits) => Ok(bits),
        _ => Err(SchemaError::Syntax),
    }
}

/// Evaluates `a * b * ...` over unsigned integers.
fn parse_product(text: &str) -> Result<usize, SchemaError> {
    let mut product: usize = 1;
    for factor in text.split('*') {
        let factor = factor.trim().parse::<usize>().map_err(|_| SchemaError::Syntax)?;
        product = product.checked_mul(factor).ok_or(SchemaError::Syntax)?;
    }
    Ok(product)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Maps a type reference to the full name of an embedded definition.
///
/// `Name.1.0` refers to the namespace of the owner, anything longer is a full name.
fn resolve_reference(owner: &str, reference: &str) -> Result<&'static str, SchemaError> {
    let mut parts = reference.rsplitn(4, '.');
    let minor = parts.next().ok_or(SchemaError::Syntax)?;
    let major = parts.next().ok_or(SchemaError::Syntax)?;
    let short = parts.next().ok_or(SchemaError::Syntax)?;
    let is_version = |text: &str| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit());
    if !is_version(major) || !is_version(minor) || short.is_empty() {
        return Err(SchemaError::Syntax);
    }

    let found = if parts.next().is_some() {
        definitions::find(reference)
    } else {
        let namespace = owner.rsplitn(4, '.').nth(3).ok_or(SchemaError::Syntax)?;
        let mut full: String<MAX_NAME_LENGTH> = String::new();
        full.push_str(namespace)
            .map_err(|_| SchemaError::CapacityExceeded)?;
        full.push('.').map_err(|_| SchemaError::CapacityExceeded)?;
        full.push_str(reference)
            .map_err(|_| SchemaError::CapacityExceeded)?;
        definitions::find(&full)
    };
    found.map(|(name, _)| name).ok_or(SchemaError::UnknownType)
}
