//! Decoder for compound keycode expressions.
//!
//! Handles everything [`KeycodeRegistry::deserialize`] cannot resolve with
//! a plain map lookup: numeric literals, generated ids written with
//! different spacing, and masked compositions including nested modifier
//! chords such as `LCTL(LSFT(KC_A))`.
//!
//! [`KeycodeRegistry::deserialize`]: crate::keycodes::KeycodeRegistry::deserialize

use crate::error::KeyboardError;
use crate::keycodes::KeycodeRegistry;

/// Decode one expression to its numeric keycode.
pub fn decode(registry: &KeycodeRegistry, token: &str) -> Result<u16, KeyboardError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(unknown(token));
    }
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u16::from_str_radix(hex, 16).map_err(|_| unknown(token));
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse().map_err(|_| unknown(token));
    }
    if let Some(kc) = registry.find_by_id(token) {
        return Ok(kc.code);
    }

    let (name, args) = split_call(token).ok_or_else(|| unknown(token))?;

    // generated ids (MO(3), OSM(MOD_LSFT), TD(7)) written with nonstandard
    // spacing normalize to their registered form
    let normalized = format!("{name}({})", args.join(", "));
    if let Some(kc) = registry.find_by_id(&normalized) {
        return Ok(kc.code);
    }

    // masked composition: the outer family is registered with a trailing
    // `kc` placeholder; the last argument supplies the inner keycode
    let (inner_arg, head) = args.split_last().ok_or_else(|| unknown(token))?;
    let outer_id = if head.is_empty() {
        format!("{name}(kc)")
    } else {
        format!("{name}({}, kc)", head.join(", "))
    };
    let outer = registry
        .find_by_id(&outer_id)
        .filter(|kc| kc.masked)
        .ok_or_else(|| unknown(token))?;
    let inner = decode(registry, inner_arg)?;
    Ok(outer.code | inner)
}

fn unknown(token: &str) -> KeyboardError {
    KeyboardError::UnknownKeycode(token.to_owned())
}

/// Split `NAME(a, b(c), d)` into the name and its top-level arguments.
fn split_call(token: &str) -> Option<(&str, Vec<String>)> {
    let open = token.find('(')?;
    if !token.ends_with(')') || open == 0 {
        return None;
    }
    let name = &token[..open];
    let body = &token[open + 1..token.len() - 1];

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                args.push(body[start..i].trim().to_owned());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    let last = body[start..].trim();
    if !last.is_empty() {
        args.push(last.to_owned());
    }
    Some((name, args))
}
