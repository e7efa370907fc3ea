//! Test fixtures: small datasets.

pub const SALES_CSV: &str = "date,region,revenue\n2024-01-01,north,100.5\n2024-01-02,south,98.0\n";

pub fn sales_csv() -> Vec<u8> {
    SALES_CSV.as_bytes().to_vec()
}

/// A CSV whose rows disagree with the header width.
pub fn ragged_csv() -> Vec<u8> {
    b"a,b,c\n1,2,3\n4,5\n".to_vec()
}
