use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("Wrong contract code length: {0} (expected 5 characters)")]
    WrongLength(String),
    #[error("Wrong delivery year in contract code: {0}")]
    BadYear(String),
    #[error("Wrong delivery month letter '{letter}' in contract code: {code}")]
    BadMonthLetter { code: String, letter: char },
}

//the fixed futures month alphabet, january through december
pub const MONTH_LETTERS: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

//delivery month of a futures contract, ordered january..december
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeliveryMonth {
    F,
    G,
    H,
    J,
    K,
    M,
    N,
    Q,
    U,
    V,
    X,
    Z,
}

impl DeliveryMonth {
    //1-based month index (f=1 .. z=12)
    pub fn index(&self) -> i32 {
        *self as i32 + 1
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        let pos = MONTH_LETTERS.iter().position(|&c| c == letter)?;
        Some(match pos {
            0 => DeliveryMonth::F,
            1 => DeliveryMonth::G,
            2 => DeliveryMonth::H,
            3 => DeliveryMonth::J,
            4 => DeliveryMonth::K,
            5 => DeliveryMonth::M,
            6 => DeliveryMonth::N,
            7 => DeliveryMonth::Q,
            8 => DeliveryMonth::U,
            9 => DeliveryMonth::V,
            10 => DeliveryMonth::X,
            _ => DeliveryMonth::Z,
        })
    }

    pub fn letter(&self) -> char {
        MONTH_LETTERS[*self as usize]
    }
}

//a delivery-month contract code, eg "2018F" (january 2018)
//ordering is (year, month), which is the roll order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractCode {
    pub year: i32,
    pub month: DeliveryMonth,
}

impl ContractCode {
    pub fn new(year: i32, month: DeliveryMonth) -> Self {
        ContractCode { year, month }
    }

    //months since year zero, the scale month_diff works on
    pub fn month_ordinal(&self) -> i32 {
        self.year * 12 + self.month.index()
    }
}

impl FromStr for ContractCode {
    type Err = CodeError;

    //parses codes of the form yyyym, eg "2018F"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 5 {
            return Err(CodeError::WrongLength(s.to_string()));
        }

        let year_part: String = chars[..4].iter().collect();
        let year: i32 = year_part
            .parse()
            .map_err(|_| CodeError::BadYear(s.to_string()))?;

        let letter = chars[4];
        let month = DeliveryMonth::from_letter(letter).ok_or(CodeError::BadMonthLetter {
            code: s.to_string(),
            letter,
        })?;

        Ok(ContractCode { year, month })
    }
}

impl fmt::Display for ContractCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.month.letter())
    }
}

impl TryFrom<String> for ContractCode {
    type Error = CodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContractCode> for String {
    fn from(code: ContractCode) -> String {
        code.to_string()
    }
}

//integer distance in delivery months between two contract codes
pub fn month_diff(a: ContractCode, b: ContractCode) -> i32 {
    a.month_ordinal() - b.month_ordinal()
}
