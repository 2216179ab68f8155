//! Judge decision text.
//!
//! The decision travels as a display string inside `judge_data`, so this
//! module both renders it and reads a vote back out of it.

use std::fmt;

use savate_session::Fighters;

use crate::corner::{Corner, PerCorner};

/// A judge's verdict before it is rendered with fighter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing entered yet.
    Pending,
    DoubleAbandon,
    ByAbandon { winner: Corner },
    Points { winner: Corner, winner_total: i32, loser_total: i32 },
    Draw { red: i32, blue: i32 },
}

impl Decision {
    /// Pure function of the totals and abandon flags.
    pub fn derive(total: PerCorner<i32>, abandon: PerCorner<bool>) -> Self {
        match (abandon.red, abandon.blue) {
            (true, true) => Self::DoubleAbandon,
            (true, false) => Self::ByAbandon { winner: Corner::Blue },
            (false, true) => Self::ByAbandon { winner: Corner::Red },
            (false, false) if total.red > total.blue => Self::Points {
                winner: Corner::Red,
                winner_total: total.red,
                loser_total: total.blue,
            },
            (false, false) if total.blue > total.red => Self::Points {
                winner: Corner::Blue,
                winner_total: total.blue,
                loser_total: total.red,
            },
            (false, false) => Self::Draw {
                red: total.red,
                blue: total.blue,
            },
        }
    }

    pub fn winner(&self) -> Option<Corner> {
        match self {
            Self::ByAbandon { winner } | Self::Points { winner, .. } => Some(*winner),
            _ => None,
        }
    }

    /// Render with fighter names, falling back to `ROUGE` / `BLEU`.
    pub fn render(&self, fighters: &Fighters) -> String {
        match self {
            Self::Pending => "-".to_string(),
            Self::DoubleAbandon => "DOUBLE ABANDON".to_string(),
            Self::ByAbandon { winner } => {
                format!("VICTOIRE {} PAR ABANDON", decision_name(fighters, *winner))
            }
            Self::Points {
                winner,
                winner_total,
                loser_total,
            } => format!(
                "VICTOIRE {} ({winner_total}-{loser_total})",
                decision_name(fighters, *winner)
            ),
            Self::Draw { red, blue } => format!("ÉGALITÉ ({red}-{blue})"),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&Fighters::default()))
    }
}

/// Name used for `corner` inside a judge decision.
pub fn decision_name(fighters: &Fighters, corner: Corner) -> &str {
    let name = match corner {
        Corner::Red => fighters.red.trim(),
        Corner::Blue => fighters.blue.trim(),
    };
    if name.is_empty() {
        corner.decision_fallback()
    } else {
        name
    }
}

/// Name used for `corner` in the delegate's final result.
pub fn result_name(fighters: &Fighters, corner: Corner) -> &str {
    let name = match corner {
        Corner::Red => fighters.red.trim(),
        Corner::Blue => fighters.blue.trim(),
    };
    if name.is_empty() {
        corner.result_fallback()
    } else {
        name
    }
}

/// How a judge's decision text counts toward the majority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Red,
    Blue,
    Draw,
    /// Blank card or double abandon.
    None,
}

impl Vote {
    /// Read a vote back out of a rendered decision.
    ///
    /// `VICTOIRE <name> ...` is matched against the current fighter names,
    /// preferring the longest match. Anything else falls back to looking for
    /// the corner words `ROUGE` / `BLEU`.
    pub fn from_decision(decision: &str, fighters: &Fighters) -> Self {
        let decision = decision.trim();
        if decision.starts_with("ÉGALITÉ") {
            return Self::Draw;
        }
        if let Some(rest) = decision.strip_prefix("VICTOIRE ") {
            let named = Corner::BOTH
                .into_iter()
                .filter(|corner| {
                    let name = decision_name(fighters, *corner);
                    rest.strip_prefix(name)
                        .is_some_and(|tail| tail.is_empty() || tail.starts_with(' '))
                })
                .max_by_key(|corner| decision_name(fighters, *corner).len());
            if let Some(corner) = named {
                return corner.into();
            }
        }
        if decision.contains(Corner::Red.decision_fallback()) {
            Self::Red
        } else if decision.contains(Corner::Blue.decision_fallback()) {
            Self::Blue
        } else {
            Self::None
        }
    }
}

impl From<Corner> for Vote {
    fn from(corner: Corner) -> Self {
        match corner {
            Corner::Red => Self::Red,
            Corner::Blue => Self::Blue,
        }
    }
}
