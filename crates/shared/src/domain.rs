use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One stage of the physical production pipeline. The board renders one
/// column per sector, in `ALL` order; `Expedicao` is the terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Usinagem,
    Marcenaria,
    Montagem,
    Tapecaria,
    Lustracao,
    Expedicao,
}

impl Sector {
    pub const ALL: [Sector; 6] = [
        Sector::Usinagem,
        Sector::Marcenaria,
        Sector::Montagem,
        Sector::Tapecaria,
        Sector::Lustracao,
        Sector::Expedicao,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Sector::Usinagem => "usinagem",
            Sector::Marcenaria => "marcenaria",
            Sector::Montagem => "montagem",
            Sector::Tapecaria => "tapecaria",
            Sector::Lustracao => "lustracao",
            Sector::Expedicao => "expedicao",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sector::Usinagem => "Usinagem",
            Sector::Marcenaria => "Marcenaria",
            Sector::Montagem => "Montagem",
            Sector::Tapecaria => "Tapeçaria",
            Sector::Lustracao => "Lustração",
            Sector::Expedicao => "Expedição",
        }
    }

    /// Numeric identifier the remote system uses for this sector. This table
    /// and `from_remote_id` are the only key<->id mapping in the codebase.
    pub fn remote_id(self) -> i64 {
        match self {
            Sector::Usinagem => 1,
            Sector::Marcenaria => 2,
            Sector::Montagem => 3,
            Sector::Tapecaria => 4,
            Sector::Lustracao => 5,
            Sector::Expedicao => 6,
        }
    }

    /// Maps a remote sector id back to its key. An unknown or absent id maps
    /// to `Usinagem`, the first stage: orders the remote has not yet routed
    /// land at the start of the pipeline rather than being dropped.
    pub fn from_remote_id(id: Option<i64>) -> Sector {
        match id {
            Some(1) => Sector::Usinagem,
            Some(2) => Sector::Marcenaria,
            Some(3) => Sector::Montagem,
            Some(4) => Sector::Tapecaria,
            Some(5) => Sector::Lustracao,
            Some(6) => Sector::Expedicao,
            _ => Sector::Usinagem,
        }
    }

    pub fn from_key(key: &str) -> Option<Sector> {
        Sector::ALL.iter().copied().find(|s| s.key() == key)
    }

    pub fn is_terminal(self) -> bool {
        self == Sector::Expedicao
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Alta,
    Media,
    Baixa,
}

/// A line item of an order. `id` is present only once the remote system
/// knows the product; it is required for any field-level patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<i64>,
    pub name: String,
    pub quantity: u32,
    pub wood_color: Option<String>,
    pub coating_color: Option<String>,
    pub details: Option<String>,
    pub measurement_details: Option<String>,
}

/// The board's representation of one customer order. `id` is assigned by the
/// remote system and is the join key for every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub order_number: String,
    pub client: String,
    pub description: String,
    pub products: Vec<Product>,
    pub sector: Sector,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Case-insensitive substring match over order number, client,
    /// description, and product names. Drives the board search box.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let term = term.to_lowercase();
        self.order_number.to_lowercase().contains(&term)
            || self.client.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self
                .products
                .iter()
                .any(|p| p.name.to_lowercase().contains(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_key_id_mapping_round_trips() {
        for sector in Sector::ALL {
            assert_eq!(Sector::from_remote_id(Some(sector.remote_id())), sector);
            assert_eq!(Sector::from_key(sector.key()), Some(sector));
        }
    }

    #[test]
    fn unknown_remote_id_falls_back_to_usinagem() {
        assert_eq!(Sector::from_remote_id(Some(99)), Sector::Usinagem);
        assert_eq!(Sector::from_remote_id(None), Sector::Usinagem);
    }

    #[test]
    fn only_expedicao_is_terminal() {
        assert!(Sector::Expedicao.is_terminal());
        assert!(!Sector::Lustracao.is_terminal());
    }
}
