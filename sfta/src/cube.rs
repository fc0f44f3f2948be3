use std::fmt;

use crate::storage::Variable;

/// A single position of a partial Boolean valuation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bit
{
    Zero,
    One,
    Any,
}

/// A partial valuation over the variables `0..width`. Positions set to
/// [Bit::Any] are don't-cares, so a cube denotes the set of all full
/// valuations (minterms) consistent with its fixed positions.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cube
{
    bits: Vec<Bit>,
}

impl Cube
{
    /// The universal cube: every position is a don't-care.
    pub fn any(width: usize) -> Cube
    {
        Cube { bits: vec![Bit::Any; width] }
    }

    pub fn from_bits(bits: &[Bit]) -> Cube
    {
        Cube { bits: bits.to_vec() }
    }

    pub fn width(&self) -> usize
    {
        self.bits.len()
    }

    pub fn bit(&self, var: Variable) -> Bit
    {
        self.bits[var as usize]
    }

    pub fn set(&mut self, var: Variable, bit: Bit)
    {
        self.bits[var as usize] = bit;
    }

    /// Returns true iff every position is a don't-care.
    pub fn is_universal(&self) -> bool
    {
        self.bits.iter().all(|bit| *bit == Bit::Any)
    }

    /// Iterates all minterms consistent with this cube, in lexicographic
    /// order on the variable index (low branch before high branch). A cube
    /// with k don't-cares yields exactly 2^k minterms.
    pub fn minterms(&self) -> Minterms
    {
        let first = self.bits.iter().map(|bit| *bit == Bit::One).collect();
        Minterms { cube: self, current: Some(first) }
    }
}

impl fmt::Display for Cube
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for bit in &self.bits
        {
            match bit
            {
                Bit::Zero => write!(f, "0")?,
                Bit::One => write!(f, "1")?,
                Bit::Any => write!(f, "*")?,
            }
        }

        Ok(())
    }
}

pub struct Minterms<'a>
{
    cube: &'a Cube,
    current: Option<Vec<bool>>,
}

impl Iterator for Minterms<'_>
{
    type Item = Vec<bool>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let current = self.current.take()?;

        // Compute the successor by binary increment over the don't-care
        // positions, least significant (highest variable index) first.
        let mut next = current.clone();
        for position in (0..self.cube.bits.len()).rev()
        {
            if self.cube.bits[position] != Bit::Any
            {
                continue;
            }

            if next[position]
            {
                next[position] = false;
            }
            else
            {
                next[position] = true;
                self.current = Some(next);
                break;
            }
        }

        Some(current)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn fixed_cube_has_single_minterm()
    {
        let cube = Cube::from_bits(&[Bit::One, Bit::Zero, Bit::One]);
        let minterms: Vec<Vec<bool>> = cube.minterms().collect();

        assert_eq!(minterms, vec![vec![true, false, true]]);
    }

    #[test]
    fn dont_cares_enumerate_lexicographically()
    {
        let cube = Cube::from_bits(&[Bit::Any, Bit::One, Bit::Any]);
        let minterms: Vec<Vec<bool>> = cube.minterms().collect();

        assert_eq!(
            minterms,
            vec![
                vec![false, true, false],
                vec![false, true, true],
                vec![true, true, false],
                vec![true, true, true],
            ]
        );
    }

    #[test]
    fn universal_cube_counts_all_minterms()
    {
        let cube = Cube::any(5);

        assert!(cube.is_universal());
        assert_eq!(cube.minterms().count(), 32);
    }

    #[test]
    fn empty_cube_has_one_empty_minterm()
    {
        let cube = Cube::any(0);
        let minterms: Vec<Vec<bool>> = cube.minterms().collect();

        assert_eq!(minterms, vec![Vec::<bool>::new()]);
    }

    #[test]
    fn iteration_is_restartable()
    {
        let cube = Cube::from_bits(&[Bit::Any, Bit::Zero]);
        let first: Vec<Vec<bool>> = cube.minterms().collect();
        let second: Vec<Vec<bool>> = cube.minterms().collect();

        assert_eq!(first, second);
    }

    #[test]
    fn display_uses_star_for_dont_care()
    {
        let cube = Cube::from_bits(&[Bit::One, Bit::Any, Bit::Zero]);

        assert_eq!(format!("{}", cube), "1*0");
    }
}
