//! Bullets - the validated five-sentence summary produced by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bullets every summary must carry.
pub const BULLET_COUNT: usize = 5;

/// Exactly five non-empty summary sentences, in model order.
///
/// The only way to build one is through [`Bullets::try_from`], so holding a
/// `Bullets` value means the arity contract has already been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Bullets([String; BULLET_COUNT]);

/// Why a list of strings could not become [`Bullets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulletsError {
    WrongCount(usize),
    EmptyBullet(usize),
}

impl fmt::Display for BulletsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongCount(n) => write!(f, "expected {BULLET_COUNT} bullets, got {n}"),
            Self::EmptyBullet(i) => write!(f, "bullet {} is empty", i + 1),
        }
    }
}

impl std::error::Error for BulletsError {}

impl Bullets {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into()
    }
}

impl TryFrom<Vec<String>> for Bullets {
    type Error = BulletsError;

    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        let len = items.len();
        let bullets: [String; BULLET_COUNT] = items
            .try_into()
            .map_err(|_| BulletsError::WrongCount(len))?;
        if let Some(i) = bullets.iter().position(|b| b.trim().is_empty()) {
            return Err(BulletsError::EmptyBullet(i));
        }
        Ok(Self(bullets))
    }
}

impl From<Bullets> for Vec<String> {
    fn from(bullets: Bullets) -> Self {
        bullets.into_vec()
    }
}

impl<'a> IntoIterator for &'a Bullets {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
