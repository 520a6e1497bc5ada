//! Internal ↔ venue symbol conversion
//!
//! Internal symbols use `_` separators: `ETH_USDT` (spot) and
//! `ETH_USDT_SWAP` (perpetual). Anything with a third segment is treated as
//! a perpetual swap on OKX (`PEPE_USDT_PERP` → `PEPE-USDT-SWAP`).
//!
//! Conversions are pure and return `None` on malformed input instead of
//! panicking.

/// Internal symbol → OKX instrument id
pub fn to_okx_inst_id(symbol: &str) -> Option<String> {
    let mut parts = symbol.split('_');
    let base = parts.next().filter(|s| !s.is_empty())?;
    let quote = parts.next().filter(|s| !s.is_empty())?;
    match (parts.next(), parts.next()) {
        (None, _) => Some(format!("{}-{}", base, quote)),
        (Some(_), None) => Some(format!("{}-{}-SWAP", base, quote)),
        _ => None,
    }
}

/// OKX instrument id → internal symbol
pub fn from_okx_inst_id(inst_id: &str) -> Option<String> {
    let mut parts = inst_id.split('-');
    let base = parts.next().filter(|s| !s.is_empty())?;
    let quote = parts.next().filter(|s| !s.is_empty())?;
    match (parts.next(), parts.next()) {
        (None, _) => Some(format!("{}_{}", base, quote)),
        (Some(_), None) => Some(format!("{}_{}_SWAP", base, quote)),
        _ => None,
    }
}

/// Internal spot symbol → Binance symbol (`ETH_USDT` → `ETHUSDT`)
pub fn to_binance_symbol(symbol: &str) -> Option<String> {
    let mut parts = symbol.split('_');
    let base = parts.next().filter(|s| !s.is_empty())?;
    let quote = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("{}{}", base, quote).to_ascii_uppercase())
}

/// Base and quote assets of an internal symbol
pub fn base_quote(symbol: &str) -> Option<(&str, &str)> {
    let mut parts = symbol.split('_');
    let base = parts.next().filter(|s| !s.is_empty())?;
    let quote = parts.next().filter(|s| !s.is_empty())?;
    Some((base, quote))
}

/// True for perpetual symbols
#[inline]
pub fn is_perp(symbol: &str) -> bool {
    symbol.ends_with("_SWAP") || symbol.ends_with("_PERP")
}
