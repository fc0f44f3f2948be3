use rustc_hash::FxHashMap;

use crate::cube::{Bit, Cube};
use crate::storage::Variable;

/// Code of a ranked alphabet symbol. Symbols are interpreted as bit-vectors
/// of the alphabet width, most significant variable first.
pub type Symbol = u32;

/// The ranked alphabet of an engine. Symbol names are assigned dense codes
/// on first insertion; a code encodes into the Boolean cube the transition
/// MTBDDs branch on.
pub struct Alphabet
{
    width: usize,
    symbols: Vec<(String, usize)>, // Name and arity, indexed by code.
    index: FxHashMap<String, Symbol>,
}

impl Alphabet
{
    pub fn new(width: usize) -> Alphabet
    {
        assert!(width < 32, "alphabet width should fit a symbol code");

        Alphabet {
            width,
            symbols: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn width(&self) -> usize
    {
        self.width
    }

    pub fn len(&self) -> usize
    {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.symbols.is_empty()
    }

    /// Returns the code of the given symbol, allocating a fresh one for an
    /// unknown name. Re-inserting a known symbol with a different arity is
    /// misuse.
    pub fn insert(&mut self, name: &str, arity: usize) -> Symbol
    {
        if let Some(symbol) = self.index.get(name)
        {
            assert_eq!(
                self.symbols[*symbol as usize].1, arity,
                "symbol {} reinserted with a different arity", name
            );
            return *symbol;
        }

        assert!(
            self.symbols.len() < 1 << self.width,
            "alphabet of width {} is full", self.width
        );

        let symbol = self.symbols.len() as Symbol;
        self.symbols.push((name.to_string(), arity));
        self.index.insert(name.to_string(), symbol);
        symbol
    }

    pub fn symbol(&self, name: &str) -> Option<Symbol>
    {
        self.index.get(name).copied()
    }

    pub fn name(&self, symbol: Symbol) -> &str
    {
        &self.symbols[symbol as usize].0
    }

    pub fn arity(&self, symbol: Symbol) -> usize
    {
        self.symbols[symbol as usize].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str, usize)> + '_
    {
        self.symbols
            .iter()
            .enumerate()
            .map(|(code, (name, arity))| (code as Symbol, name.as_str(), *arity))
    }

    /// Encodes a symbol as the fully specified cube of its code, most
    /// significant bit on variable 0.
    pub fn encode(&self, symbol: Symbol) -> Cube
    {
        debug_assert!((symbol as usize) < self.symbols.len(), "unknown symbol code");

        let mut cube = Cube::any(self.width);
        for position in 0..self.width
        {
            let bit = (symbol >> (self.width - 1 - position)) & 1;
            cube.set(position as Variable, if bit == 1 { Bit::One } else { Bit::Zero });
        }

        cube
    }

    /// The universal symbol: the cube covering every symbol value.
    pub fn universal(&self) -> Cube
    {
        Cube::any(self.width)
    }

    /// Decodes a minterm back into the symbol code it spells.
    pub fn decode(&self, minterm: &[bool]) -> Symbol
    {
        debug_assert_eq!(minterm.len(), self.width, "minterm width mismatch");

        let mut symbol: Symbol = 0;
        for bit in minterm
        {
            symbol = (symbol << 1) | u32::from(*bit);
        }

        debug_assert!((symbol as usize) < self.symbols.len(), "minterm spells no known symbol");
        symbol
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn codes_are_dense_and_stable()
    {
        let mut alphabet = Alphabet::new(4);

        assert_eq!(alphabet.insert("a", 0), 0);
        assert_eq!(alphabet.insert("f", 2), 1);
        assert_eq!(alphabet.insert("a", 0), 0);
        assert_eq!(alphabet.len(), 2);
        assert_eq!(alphabet.name(1), "f");
        assert_eq!(alphabet.arity(1), 2);
    }

    #[test]
    fn encoding_is_most_significant_variable_first()
    {
        let mut alphabet = Alphabet::new(3);
        for name in ["s0", "s1", "s2", "s3", "s4", "s5"]
        {
            alphabet.insert(name, 0);
        }

        let cube = alphabet.encode(5); // 101 in binary
        assert_eq!(cube.bit(0), Bit::One);
        assert_eq!(cube.bit(1), Bit::Zero);
        assert_eq!(cube.bit(2), Bit::One);
    }

    #[test]
    fn decode_inverts_encode()
    {
        let mut alphabet = Alphabet::new(4);
        for name in ["a", "b", "c", "d", "e"]
        {
            alphabet.insert(name, 1);
        }

        for symbol in 0..alphabet.len() as Symbol
        {
            let minterms: Vec<Vec<bool>> = alphabet.encode(symbol).minterms().collect();
            assert_eq!(minterms.len(), 1);
            assert_eq!(alphabet.decode(&minterms[0]), symbol);
        }
    }

    #[test]
    fn universal_symbol_covers_the_whole_code_space()
    {
        let alphabet = Alphabet::new(3);

        assert!(alphabet.universal().is_universal());
        assert_eq!(alphabet.universal().minterms().count(), 8);
    }

    #[test]
    #[should_panic(expected = "different arity")]
    fn conflicting_arity_is_misuse()
    {
        let mut alphabet = Alphabet::new(4);
        alphabet.insert("f", 2);
        alphabet.insert("f", 3);
    }
}
