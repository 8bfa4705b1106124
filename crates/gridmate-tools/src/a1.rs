//! A1-notation parsing and formatting helpers

/// A single cell position, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

/// A rectangular range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    pub fn rows(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    pub fn cols(&self) -> usize {
        self.end.col - self.start.col + 1
    }
}

/// Split an optional sheet prefix off a reference ("Budget!A1:B2").
pub fn split_sheet(reference: &str) -> (Option<&str>, &str) {
    match reference.rsplit_once('!') {
        Some((sheet, rest)) => (Some(sheet.trim_matches('\'')), rest),
        None => (None, reference),
    }
}

/// Convert column letters to a 0-based index ("A" -> 0, "AB" -> 27).
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index: usize = 0;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        index = index * 26 + (c as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Convert a 0-based column index to letters (0 -> "A", 27 -> "AB").
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parse a single cell reference ("B3"), ignoring absolute markers.
pub fn parse_cell(reference: &str) -> Option<CellRef> {
    let reference = reference.trim().replace('$', "");
    let letters: String = reference.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = reference.chars().skip(letters.len()).collect();
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some(CellRef {
        row: row - 1,
        col: column_index(&letters)?,
    })
}

/// Parse a range ("A1:B10" or a single cell "A1"), ignoring any sheet prefix.
pub fn parse_range(reference: &str) -> Option<RangeRef> {
    let (_, reference) = split_sheet(reference.trim());
    match reference.split_once(':') {
        Some((start, end)) => {
            let start = parse_cell(start)?;
            let end = parse_cell(end)?;
            // Normalize so start is the top-left corner
            Some(RangeRef {
                start: CellRef {
                    row: start.row.min(end.row),
                    col: start.col.min(end.col),
                },
                end: CellRef {
                    row: start.row.max(end.row),
                    col: start.col.max(end.col),
                },
            })
        }
        None => {
            let cell = parse_cell(reference)?;
            Some(RangeRef {
                start: cell,
                end: cell,
            })
        }
    }
}

/// Format a cell as A1 notation.
pub fn format_cell(cell: CellRef) -> String {
    format!("{}{}", column_letters(cell.col), cell.row + 1)
}

/// Format a range as A1 notation, collapsing single cells.
pub fn format_range(range: RangeRef) -> String {
    if range.start == range.end {
        format_cell(range.start)
    } else {
        format!("{}:{}", format_cell(range.start), format_cell(range.end))
    }
}
