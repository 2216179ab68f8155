//! Red and blue corners.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corner {
    Red,
    Blue,
}

impl Corner {
    pub const BOTH: [Corner; 2] = [Corner::Red, Corner::Blue];

    pub const fn opposite(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// Name shown in a judge decision when no fighter name was entered.
    pub const fn decision_fallback(self) -> &'static str {
        match self {
            Self::Red => "ROUGE",
            Self::Blue => "BLEU",
        }
    }

    /// Name shown in the final result when no fighter name was entered.
    pub const fn result_fallback(self) -> &'static str {
        match self {
            Self::Red => "TIREUR ROUGE",
            Self::Blue => "TIREUR BLEU",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" | "rouge" => Ok(Self::Red),
            "blue" | "bleu" => Ok(Self::Blue),
            other => Err(format!("unknown corner: {other}")),
        }
    }
}

/// One value per corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerCorner<T> {
    pub red: T,
    pub blue: T,
}

impl<T> PerCorner<T> {
    pub const fn new(red: T, blue: T) -> Self {
        Self { red, blue }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerCorner<U> {
        PerCorner {
            red: f(self.red),
            blue: f(self.blue),
        }
    }
}

impl<T> Index<Corner> for PerCorner<T> {
    type Output = T;

    fn index(&self, corner: Corner) -> &T {
        match corner {
            Corner::Red => &self.red,
            Corner::Blue => &self.blue,
        }
    }
}

impl<T> IndexMut<Corner> for PerCorner<T> {
    fn index_mut(&mut self, corner: Corner) -> &mut T {
        match corner {
            Corner::Red => &mut self.red,
            Corner::Blue => &mut self.blue,
        }
    }
}
