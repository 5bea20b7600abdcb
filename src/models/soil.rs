use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilTexture {
    Arenoso,
    FrancoArenoso,
    Franco,
    FrancoArgiloso,
    Argiloso,
    ArgiloArenoso,
}

impl SoilTexture {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoilTexture::Arenoso => "arenoso",
            SoilTexture::FrancoArenoso => "franco_arenoso",
            SoilTexture::Franco => "franco",
            SoilTexture::FrancoArgiloso => "franco_argiloso",
            SoilTexture::Argiloso => "argiloso",
            SoilTexture::ArgiloArenoso => "argilo_arenoso",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "arenoso" | "sandy" => Some(SoilTexture::Arenoso),
            "franco_arenoso" | "sandy loam" | "sandyloam" => Some(SoilTexture::FrancoArenoso),
            "franco" | "loam" => Some(SoilTexture::Franco),
            "franco_argiloso" | "clay loam" | "clayloam" => Some(SoilTexture::FrancoArgiloso),
            "argiloso" | "clay" => Some(SoilTexture::Argiloso),
            "argilo_arenoso" | "sandy clay" | "sandyclay" => Some(SoilTexture::ArgiloArenoso),
            _ => None,
        }
    }

    pub fn is_sandy(&self) -> bool {
        matches!(self, SoilTexture::Arenoso)
    }
}

impl std::fmt::Display for SoilTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhClass {
    MuitoAcido,
    Acido,
    LigeiramenteAcido,
    Neutro,
    LigeiramenteAlcalino,
    Alcalino,
    MuitoAlcalino,
}

impl PhClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhClass::MuitoAcido => "muito_acido",
            PhClass::Acido => "acido",
            PhClass::LigeiramenteAcido => "ligeiramente_acido",
            PhClass::Neutro => "neutro",
            PhClass::LigeiramenteAlcalino => "ligeiramente_alcalino",
            PhClass::Alcalino => "alcalino",
            PhClass::MuitoAlcalino => "muito_alcalino",
        }
    }

    pub fn classify(ph: f64) -> Self {
        if ph < 4.5 {
            PhClass::MuitoAcido
        } else if ph < 5.5 {
            PhClass::Acido
        } else if ph < 6.5 {
            PhClass::LigeiramenteAcido
        } else if ph < 7.5 {
            PhClass::Neutro
        } else if ph < 8.5 {
            PhClass::LigeiramenteAlcalino
        } else if ph < 9.5 {
            PhClass::Alcalino
        } else {
            PhClass::MuitoAlcalino
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientClass {
    MuitoBaixo,
    Baixo,
    Medio,
    Alto,
    MuitoAlto,
}

impl NutrientClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NutrientClass::MuitoBaixo => "muito_baixo",
            NutrientClass::Baixo => "baixo",
            NutrientClass::Medio => "medio",
            NutrientClass::Alto => "alto",
            NutrientClass::MuitoAlto => "muito_alto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    Nitrogen,
    Phosphorus,
    Potassium,
}

impl Nutrient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nutrient::Nitrogen => "nitrogen",
            Nutrient::Phosphorus => "phosphorus",
            Nutrient::Potassium => "potassium",
        }
    }

    /// (low, medium, high) limits; N and P in mg/dm³, K in cmolc/dm³.
    fn limits(&self) -> (f64, f64, f64) {
        match self {
            Nutrient::Nitrogen => (20.0, 40.0, 60.0),
            Nutrient::Phosphorus => (10.0, 20.0, 40.0),
            Nutrient::Potassium => (0.15, 0.30, 0.60),
        }
    }

    pub fn classify(&self, value: f64) -> NutrientClass {
        let (low, medium, high) = self.limits();
        if value < low * 0.5 {
            NutrientClass::MuitoBaixo
        } else if value < low {
            NutrientClass::Baixo
        } else if value < medium {
            NutrientClass::Medio
        } else if value < high {
            NutrientClass::Alto
        } else {
            NutrientClass::MuitoAlto
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientLevels {
    pub nitrogen: Option<f64>,
    pub phosphorus: Option<f64>,
    pub potassium: Option<f64>,
}

impl NutrientLevels {
    /// Class of every nutrient that was measured.
    pub fn classes(&self) -> Vec<(Nutrient, NutrientClass)> {
        [
            (Nutrient::Nitrogen, self.nitrogen),
            (Nutrient::Phosphorus, self.phosphorus),
            (Nutrient::Potassium, self.potassium),
        ]
        .into_iter()
        .filter_map(|(n, v)| v.map(|v| (n, n.classify(v))))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilSample {
    pub id: Option<i64>,
    #[serde(default)]
    pub plantation_id: i64,
    pub ph: f64,
    pub texture: Option<SoilTexture>,
    #[serde(default)]
    pub nutrients: NutrientLevels,
    pub analysis_date: NaiveDate,
}

impl SoilSample {
    pub fn new(plantation_id: i64, ph: f64, analysis_date: NaiveDate) -> Self {
        Self {
            id: None,
            plantation_id,
            ph,
            texture: None,
            nutrients: NutrientLevels::default(),
            analysis_date,
        }
    }
}

/// What the soil rules actually look at: a sample, or the plantation's snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilSnapshot {
    pub ph: Option<f64>,
    pub texture: Option<SoilTexture>,
    pub nutrients: NutrientLevels,
}

impl SoilSnapshot {
    pub fn from_sample(sample: &SoilSample) -> Self {
        Self {
            ph: Some(sample.ph),
            texture: sample.texture,
            nutrients: sample.nutrients,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ph.is_none() && self.texture.is_none()
    }
}
