//! JVM descriptor utilities: locating embedded type references, masking and
//! unmasking array dimensions, erasing references to the universal top type,
//! and expanding one descriptor into its per-environment variants.

use std::ops::Range;

use crate::config::SymbolMap;
use crate::error::RewriteError;

/// The universal top type every erased reference collapses to.
pub const OBJECT: &str = "java/lang/Object";

/// Number of array dimensions encoded in an internal name or descriptor,
/// i.e. the run of leading `[` markers.
pub fn array_dimensions(internal_name: &str) -> usize {
    internal_name.bytes().take_while(|&b| b == b'[').count()
}

/// Strips array wrapping from an internal name, yielding the element type.
///
/// `"[[Lcom/example/Foo;"` becomes `"com/example/Foo"`; a non-array name is
/// returned unchanged. Primitive array element markers are returned as-is.
pub fn mask_array(internal_name: &str) -> &str {
    let dimensions = array_dimensions(internal_name);
    if dimensions == 0 {
        return internal_name;
    }
    let element = &internal_name[dimensions..];
    match element.strip_prefix('L').and_then(|e| e.strip_suffix(';')) {
        Some(name) => name,
        None => element,
    }
}

/// Re-wraps a masked element type in the array dimensions of the original
/// name, so array depth survives a type substitution.
pub fn unmask_array(original: &str, masked: &str) -> String {
    let dimensions = array_dimensions(original);
    if dimensions == 0 {
        masked.to_string()
    } else {
        format!("{}L{};", "[".repeat(dimensions), masked)
    }
}

/// Replaces the element type of an internal name with the top type,
/// preserving array depth. `"com/a/Foo"` erases to `"java/lang/Object"`,
/// `"[Lcom/a/Foo;"` to `"[Ljava/lang/Object;"`.
pub fn erase_reference(internal_name: &str) -> String {
    unmask_array(internal_name, OBJECT)
}

/// The field-descriptor form of an erased reference: `"Ljava/lang/Object;"`
/// for a plain name, the erased array descriptor for an array name.
pub fn erased_reference_descriptor(internal_name: &str) -> String {
    if array_dimensions(internal_name) == 0 {
        format!("L{OBJECT};")
    } else {
        erase_reference(internal_name)
    }
}

/// Byte ranges of every embedded type reference in a descriptor. Each range
/// covers the bare internal name between its `L` and `;` markers.
///
/// The descriptor is validated as it is scanned: an `L` marker without a
/// closing `;`, or a byte that is not part of descriptor syntax, is fatal.
pub fn scan_references(descriptor: &str) -> Result<Vec<Range<usize>>, RewriteError> {
    let bytes = descriptor.as_bytes();
    let mut references = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' | b')' | b'[' => pos += 1,
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => pos += 1,
            b'L' => match descriptor[pos + 1..].find(';') {
                Some(semi) => {
                    references.push(pos + 1..pos + 1 + semi);
                    pos += semi + 2;
                }
                None => {
                    return Err(RewriteError::MalformedDescriptor {
                        descriptor: descriptor.to_string(),
                    })
                }
            },
            _ => {
                return Err(RewriteError::MalformedDescriptor {
                    descriptor: descriptor.to_string(),
                })
            }
        }
    }
    Ok(references)
}

/// Rewrites every embedded type reference through `f`, leaving the rest of
/// the descriptor untouched.
pub fn map_references(
    descriptor: &str,
    mut f: impl FnMut(&str) -> String,
) -> Result<String, RewriteError> {
    let references = scan_references(descriptor)?;
    let mut out = String::with_capacity(descriptor.len());
    let mut pos = 0;
    for range in references {
        out.push_str(&descriptor[pos..range.start]);
        out.push_str(&f(&descriptor[range.clone()]));
        pos = range.end;
    }
    out.push_str(&descriptor[pos..]);
    Ok(out)
}

/// Erases every embedded type reference matching `matches` to the top type.
///
/// Idempotent as long as the predicate does not match the top type itself.
pub fn erase_descriptor(
    descriptor: &str,
    matches: impl Fn(&str) -> bool,
) -> Result<String, RewriteError> {
    map_references(descriptor, |name| {
        if matches(name) {
            OBJECT.to_string()
        } else {
            name.to_string()
        }
    })
}

/// Expands a descriptor containing environment-dependent type references
/// into one concrete descriptor per environment.
///
/// Returns `Ok(None)` when no embedded reference matches the type map. A
/// single matching reference expands linearly. When several independent
/// references match, their candidate lists are zipped positionally and must
/// have equal lengths; a mismatch is a configuration error, reported rather
/// than silently truncated.
pub fn expand_descriptor(
    descriptor: &str,
    classes: &SymbolMap<str>,
) -> Result<Option<Vec<String>>, RewriteError> {
    let references = scan_references(descriptor)?;
    let mut expansions: Vec<(Range<usize>, Vec<String>)> = Vec::new();
    for range in references {
        let name = &descriptor[range.clone()];
        if classes.matches(name) {
            let candidates = classes.expand(name);
            if candidates.is_empty() {
                return Err(RewriteError::EmptyExpansion {
                    symbol: name.to_string(),
                });
            }
            expansions.push((range, candidates));
        }
    }
    let Some((_, first)) = expansions.first() else {
        return Ok(None);
    };
    let width = first.len();
    for (range, candidates) in &expansions {
        if candidates.len() != width {
            return Err(RewriteError::CandidateLengthMismatch {
                symbol: descriptor[range.clone()].to_string(),
                expected: width,
                found: candidates.len(),
            });
        }
    }

    let mut variants = Vec::with_capacity(width);
    for env in 0..width {
        let mut out = String::with_capacity(descriptor.len());
        let mut pos = 0;
        for (range, candidates) in &expansions {
            out.push_str(&descriptor[pos..range.start]);
            out.push_str(&candidates[env]);
            pos = range.end;
        }
        out.push_str(&descriptor[pos..]);
        variants.push(out);
    }
    Ok(Some(variants))
}
