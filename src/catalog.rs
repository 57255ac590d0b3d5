//! Card dataset shared with the keyboard/card UI.

use serde::{Deserialize, Serialize};

use crate::error::DotsResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Blue,
    Green,
    Yellow,
    Red,
    Orange,
}

impl CardColor {
    /// Display order used by the colour graph and the colour keys.
    pub const ORDER: [CardColor; 5] = [
        CardColor::Blue,
        CardColor::Green,
        CardColor::Yellow,
        CardColor::Red,
        CardColor::Orange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CardColor::Blue => "blue",
            CardColor::Green => "green",
            CardColor::Yellow => "yellow",
            CardColor::Red => "red",
            CardColor::Orange => "orange",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: u32,
    pub number: u32,
    pub color: CardColor,
    pub image: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CardCatalog {
    pub cards: Vec<Card>,
}

impl CardCatalog {
    pub fn from_json(json: &str) -> DotsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, id: u32) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn by_color(&self, color: CardColor) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(move |c| c.color == color)
    }

    /// Colours present in the catalog, in [`CardColor::ORDER`].
    pub fn unique_colors(&self) -> Vec<CardColor> {
        CardColor::ORDER
            .into_iter()
            .filter(|color| self.cards.iter().any(|c| c.color == *color))
            .collect()
    }
}
