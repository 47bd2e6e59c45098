//! One-hot encoding of nucleotide sequences.
//!
//! The columns 0, 1, 2, 3 correspond to A, C, G and T. All IUPAC codes are
//! accepted; an ambiguous code lights up one of its allowed columns, chosen
//! uniformly at random on every call.

use ndarray::Array2;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};

/// The columns an IUPAC code may map to. Invariant: never empty.
fn allowed_columns(nuc: u8) -> Result<&'static [usize]> {
    let columns: &[usize] = match nuc {
        b'A' => &[0],
        b'C' => &[1],
        b'G' => &[2],
        b'T' => &[3],
        b'N' => &[0, 1, 2, 3],
        b'R' => &[0, 2],
        b'Y' => &[1, 3],
        b'S' => &[1, 2],
        b'W' => &[0, 3],
        b'K' => &[2, 3],
        b'M' => &[0, 1],
        b'B' => &[1, 2, 3],
        b'D' => &[0, 2, 3],
        b'H' => &[0, 1, 3],
        b'V' => &[0, 1, 2],
        _ => return Err(Error::InvalidNucleotide(nuc)),
    };
    Ok(columns)
}

/// Convert a sequence of length n into a one-hot encoded array of shape
/// (n, 4). Case-insensitive.
pub fn encode(sequence: &[u8]) -> Result<Array2<bool>> {
    let mut rng = rand::thread_rng();
    let mut onehot = Array2::from_elem((sequence.len(), 4), false);

    for (row, &nuc) in sequence.iter().enumerate() {
        let columns = allowed_columns(nuc.to_ascii_uppercase())?;
        let column = match columns {
            [unambiguous] => *unambiguous,
            _ => *columns.choose(&mut rng).unwrap(),
        };
        onehot[[row, column]] = true;
    }

    Ok(onehot)
}
