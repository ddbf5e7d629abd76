//! Mangled names and types.
//!
//! An [`Encoding`] is a compact byte string that identifies a name or a type.
//! Two encodings are equal exactly when they denote the same name or type for
//! lookup purposes, which makes them the key type of every symbol table.
//!
//! Format:
//!
//! | bytes | meaning |
//! |---|---|
//! | `0x80+n` then `n` bytes | simple name |
//! | `0x80` alone (inside `Q`) | the global scope |
//! | `b c w i s l j f d r v` | bool char wchar_t int short long long-long float double long-double void |
//! | `S U C V` | signed unsigned const volatile (prefix the type they modify) |
//! | `P` / `R` | pointer / reference to the following type |
//! | `A<digits>_` | array of the following type |
//! | `F<params>_<ret>` | function; `v` for no parameters, `e` for an ellipsis |
//! | `CF...` | const member function |
//! | `Q<0x80+n><component>...` | qualified name of `n` components |
//! | `T<name><0x80+len><args>` | template-id |
//! | `M<class><type>` | pointer to member |
//! | `?` | no return type (constructors) |
//! | `*` | non-type template parameter |

use std::fmt;

/// Longest identifier a single length byte can describe.
pub const MAX_NAME_LENGTH: usize = 0x7f;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Encoding(Vec<u8>);

impl Encoding {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Encode an identifier. Identifiers longer than [`MAX_NAME_LENGTH`]
    /// bytes are truncated.
    pub fn simple_name(name: &str) -> Self {
        let mut e = Self::new();
        e.append_name(name);
        e
    }

    /// The component that stands for `::` at the front of a qualified name.
    pub fn global_scope() -> Self {
        Self(vec![0x80])
    }

    /// A single builtin type code such as `b'i'`.
    pub fn builtin(code: u8) -> Self {
        Self(vec![code])
    }

    /// Join name components into a qualified name. A single component is
    /// returned unchanged.
    pub fn qualified(components: &[Encoding]) -> Self {
        match components {
            [] => return Encoding::new(),
            [single] => return single.clone(),
            _ => {}
        }
        let mut e = Self(vec![b'Q', 0x80 + components.len().min(MAX_NAME_LENGTH) as u8]);
        for c in components {
            e.append(c);
        }
        e
    }

    pub fn template_id(name: &str, args: &[Encoding]) -> Self {
        let mut e = Self(vec![b'T']);
        e.append_name(name);
        let mut packed = Self::new();
        for a in args {
            packed.append(a);
        }
        e.append_with_length(&packed);
        e
    }

    /// `F<params>_<ret>`, with `v` standing for an empty parameter list.
    pub fn function(params: &[Encoding], ellipsis: bool, ret: &Encoding) -> Self {
        let mut e = Self(vec![b'F']);
        if params.is_empty() && !ellipsis {
            e.push(b'v');
        }
        for p in params {
            e.append(p);
        }
        if ellipsis {
            e.push(b'e');
        }
        e.push(b'_');
        e.append(ret);
        e
    }

    pub fn pointer_to(&self) -> Self {
        self.prefixed(b'P')
    }

    pub fn reference_to(&self) -> Self {
        self.prefixed(b'R')
    }

    pub fn const_of(&self) -> Self {
        self.prefixed(b'C')
    }

    pub fn volatile_of(&self) -> Self {
        self.prefixed(b'V')
    }

    pub fn array_of(&self, size: Option<u64>) -> Self {
        let mut e = Self(vec![b'A']);
        if let Some(n) = size {
            e.0.extend_from_slice(n.to_string().as_bytes());
        }
        e.push(b'_');
        e.append(self);
        e
    }

    fn prefixed(&self, code: u8) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.push(code);
        bytes.extend_from_slice(&self.0);
        Self(bytes)
    }

    // ------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn front(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    pub fn append(&mut self, other: &Encoding) {
        self.0.extend_from_slice(&other.0);
    }

    pub fn prepend(&mut self, bytes: &[u8]) {
        self.0.splice(0..0, bytes.iter().copied());
    }

    pub fn append_name(&mut self, name: &str) {
        let bytes = &name.as_bytes()[..name.len().min(MAX_NAME_LENGTH)];
        self.0.push(0x80 + bytes.len() as u8);
        self.0.extend_from_slice(bytes);
    }

    pub fn append_with_length(&mut self, other: &Encoding) {
        let n = other.len().min(MAX_NAME_LENGTH);
        self.0.push(0x80 + n as u8);
        self.0.extend_from_slice(&other.0[..n]);
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_simple_name(&self) -> bool {
        self.front().is_some_and(|b| b >= 0x80)
    }

    #[inline]
    pub fn is_global_scope(&self) -> bool {
        self.0 == [0x80]
    }

    #[inline]
    pub fn is_qualified(&self) -> bool {
        self.front() == Some(b'Q')
    }

    #[inline]
    pub fn is_template_id(&self) -> bool {
        self.front() == Some(b'T')
    }

    pub fn is_function(&self) -> bool {
        match self.0.as_slice() {
            [b'F', ..] | [b'C', b'F', ..] => true,
            _ => false,
        }
    }

    /// Text of a simple name.
    pub fn identifier(&self) -> Option<&str> {
        if !self.is_simple_name() {
            return None;
        }
        let len = (self.0[0] - 0x80) as usize;
        self.0.get(1..1 + len).and_then(|b| std::str::from_utf8(b).ok())
    }

    // ------------------------------------------------------------------
    // Name structure
    // ------------------------------------------------------------------

    /// Components of a qualified name, or the name itself.
    pub fn names(&self) -> Vec<Encoding> {
        if !self.is_qualified() {
            return vec![self.clone()];
        }
        let count = self.0.get(1).map_or(0, |b| b.saturating_sub(0x80)) as usize;
        let mut names = Vec::with_capacity(count);
        let mut pos = 2;
        for _ in 0..count {
            let Some(end) = skip_type(&self.0, pos) else { break };
            names.push(Self::from_bytes(&self.0[pos..end]));
            pos = end;
        }
        names
    }

    /// First component of a qualified name; empty otherwise.
    pub fn get_scope(&self) -> Encoding {
        if self.is_qualified() {
            self.names().into_iter().next().unwrap_or_default()
        } else {
            Encoding::new()
        }
    }

    /// Everything after the first component of a qualified name.
    pub fn get_symbol(&self) -> Encoding {
        if !self.is_qualified() {
            return self.clone();
        }
        let names = self.names();
        Encoding::qualified(names.get(1..).unwrap_or(&[]))
    }

    /// Last component of a qualified name, or the name itself.
    pub fn last_name(&self) -> Encoding {
        if self.is_qualified() {
            self.names().pop().unwrap_or_default()
        } else {
            self.clone()
        }
    }

    /// Name part of a template-id.
    pub fn get_template_name(&self) -> Encoding {
        if !self.is_template_id() {
            return self.clone();
        }
        match skip_type(&self.0, 1) {
            Some(end) => Self::from_bytes(&self.0[1..end]),
            None => Encoding::new(),
        }
    }

    /// Argument types of a template-id.
    pub fn get_template_arguments(&self) -> Vec<Encoding> {
        if !self.is_template_id() {
            return Vec::new();
        }
        let Some(name_end) = skip_type(&self.0, 1) else {
            return Vec::new();
        };
        let Some(&len) = self.0.get(name_end) else {
            return Vec::new();
        };
        let start = name_end + 1;
        let end = (start + len.saturating_sub(0x80) as usize).min(self.0.len());
        split_types(&self.0[start..end])
    }

    /// Parameter types and return type of a function type. An empty
    /// parameter list comes back as no parameters; a trailing ellipsis is
    /// returned as an `e` parameter.
    pub fn function_parts(&self) -> Option<(Vec<Encoding>, Encoding)> {
        let start = match self.0.as_slice() {
            [b'F', ..] => 1,
            [b'C', b'F', ..] => 2,
            _ => return None,
        };
        let mut params = Vec::new();
        let mut pos = start;
        while *self.0.get(pos)? != b'_' {
            let end = skip_type(&self.0, pos)?;
            params.push(Self::from_bytes(&self.0[pos..end]));
            pos = end;
        }
        if params.len() == 1 && params[0].0 == [b'v'] {
            params.clear();
        }
        let ret_start = pos + 1;
        let ret_end = skip_type(&self.0, ret_start)?;
        Some((params, Self::from_bytes(&self.0[ret_start..ret_end])))
    }

    /// Drop top-level `C`/`V` qualifiers.
    pub fn strip_cv(&self) -> Encoding {
        let skip = self.0.iter().take_while(|&&b| b == b'C' || b == b'V').count();
        if self.0.get(skip) == Some(&b'F') {
            return self.clone();
        }
        Self::from_bytes(&self.0[skip..])
    }

    /// Render as C++-like text.
    pub fn unmangled(&self) -> String {
        if self.is_global_scope() {
            return String::new();
        }
        let mut pos = 0;
        let mut out = String::new();
        while pos < self.0.len() {
            match render(&self.0, pos) {
                Some((text, end)) => {
                    out.push_str(&text);
                    pos = end;
                }
                None => {
                    out.push_str("<?>");
                    break;
                }
            }
        }
        out
    }
}

impl fmt::Display for Encoding {
    /// Raw bytes, with length bytes shown as `[n]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b >= 0x80 {
                write!(f, "[{}]", b - 0x80)?;
            } else {
                write!(f, "{}", b as char)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Encoding(\"{}\")", self)
    }
}

impl From<&str> for Encoding {
    fn from(name: &str) -> Self {
        Encoding::simple_name(name)
    }
}

/// Split a concatenation of complete types.
fn split_types(bytes: &[u8]) -> Vec<Encoding> {
    let mut types = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let Some(end) = skip_type(bytes, pos) else { break };
        types.push(Encoding::from_bytes(&bytes[pos..end]));
        pos = end;
    }
    types
}

/// End offset of the complete type or name starting at `pos`.
pub(crate) fn skip_type(b: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let c = *b.get(pos)?;
        match c {
            b'S' | b'U' | b'C' | b'V' | b'P' | b'R' => pos += 1,
            b'A' => {
                pos += 1;
                while *b.get(pos)? != b'_' {
                    pos += 1;
                }
                pos += 1;
            }
            b'M' => pos = skip_type(b, pos + 1)?,
            b'F' => {
                pos += 1;
                while *b.get(pos)? != b'_' {
                    pos = skip_type(b, pos)?;
                }
                return skip_type(b, pos + 1);
            }
            b'Q' => {
                let count = b.get(pos + 1)?.checked_sub(0x80)?;
                pos += 2;
                for _ in 0..count {
                    pos = skip_type(b, pos)?;
                }
                return Some(pos);
            }
            b'T' => {
                let name_end = skip_type(b, pos + 1)?;
                let len = b.get(name_end)?.checked_sub(0x80)? as usize;
                return Some(name_end + 1 + len);
            }
            b'b' | b'c' | b'w' | b'i' | b's' | b'l' | b'j' | b'f' | b'd' | b'r' | b'v'
            | b'e' | b'?' | b'*' => return Some(pos + 1),
            n if n >= 0x80 => {
                let end = pos + 1 + (n - 0x80) as usize;
                return (end <= b.len()).then_some(end);
            }
            _ => return None,
        }
    }
}

fn builtin_name(c: u8) -> Option<&'static str> {
    Some(match c {
        b'b' => "bool",
        b'c' => "char",
        b'w' => "wchar_t",
        b'i' => "int",
        b's' => "short",
        b'l' => "long",
        b'j' => "long long",
        b'f' => "float",
        b'd' => "double",
        b'r' => "long double",
        b'v' => "void",
        b'e' => "...",
        b'*' => "*",
        b'?' => "",
        _ => return None,
    })
}

/// Render the type starting at `pos`, returning the text and the end offset.
fn render(b: &[u8], pos: usize) -> Option<(String, usize)> {
    let c = *b.get(pos)?;
    let rendered = match c {
        b'S' | b'U' | b'V' => {
            let (inner, end) = render(b, pos + 1)?;
            let word = match c {
                b'S' => "signed",
                b'U' => "unsigned",
                _ => "volatile",
            };
            (format!("{} {}", word, inner), end)
        }
        b'C' if b.get(pos + 1) == Some(&b'F') => {
            let (inner, end) = render(b, pos + 1)?;
            (format!("{} const", inner), end)
        }
        b'C' => {
            let (inner, end) = render(b, pos + 1)?;
            (format!("const {}", inner), end)
        }
        b'P' | b'R' => {
            let (inner, end) = render(b, pos + 1)?;
            (format!("{}{}", inner, if c == b'P' { '*' } else { '&' }), end)
        }
        b'A' => {
            let mut p = pos + 1;
            let mut size = String::new();
            while *b.get(p)? != b'_' {
                size.push(*b.get(p)? as char);
                p += 1;
            }
            let (inner, end) = render(b, p + 1)?;
            (format!("{}[{}]", inner, size), end)
        }
        b'M' => {
            let (class, class_end) = render(b, pos + 1)?;
            let (inner, end) = render(b, class_end)?;
            (format!("{} {}::*", inner, class), end)
        }
        b'F' => {
            let mut p = pos + 1;
            let mut params = Vec::new();
            while *b.get(p)? != b'_' {
                let (param, end) = render(b, p)?;
                params.push(param);
                p = end;
            }
            if params.len() == 1 && params[0] == "void" {
                params.clear();
            }
            let (ret, end) = render(b, p + 1)?;
            let ret = if ret.is_empty() { ret } else { format!("{} ", ret) };
            (format!("{}({})", ret, params.join(", ")), end)
        }
        b'Q' => {
            let count = b.get(pos + 1)?.checked_sub(0x80)?;
            let mut p = pos + 2;
            let mut parts = Vec::new();
            for _ in 0..count {
                if b.get(p) == Some(&0x80) {
                    parts.push(String::new());
                    p += 1;
                } else {
                    let (part, end) = render(b, p)?;
                    parts.push(part);
                    p = end;
                }
            }
            (parts.join("::"), p)
        }
        b'T' => {
            let (name, name_end) = render(b, pos + 1)?;
            let len = b.get(name_end)?.checked_sub(0x80)? as usize;
            let args_start = name_end + 1;
            let args_end = args_start + len;
            let args = split_types(b.get(args_start..args_end)?);
            let args: Vec<String> = args.iter().map(Encoding::unmangled).collect();
            (format!("{}<{}>", name, args.join(",")), args_end)
        }
        n if n >= 0x80 => {
            let end = pos + 1 + (n - 0x80) as usize;
            (String::from_utf8_lossy(b.get(pos + 1..end)?).into_owned(), end)
        }
        other => (builtin_name(other)?.to_string(), pos + 1),
    };
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_type_handles_nested_function() {
        let f = Encoding::function(&[Encoding::builtin(b'i').pointer_to()], false, &Encoding::builtin(b'c'));
        assert_eq!(f.as_bytes(), b"FPi_c");
        assert_eq!(skip_type(f.as_bytes(), 0), Some(5));
    }

    #[test]
    fn test_truncates_long_identifiers() {
        let long = "x".repeat(200);
        let e = Encoding::simple_name(&long);
        assert_eq!(e.len(), MAX_NAME_LENGTH + 1);
        assert_eq!(e.front(), Some(0xff));
    }
}
