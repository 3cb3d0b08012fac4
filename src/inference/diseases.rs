//! Disease Knowledge Base
//!
//! Curated title and description for every known class name. Lookups never
//! fail: a class without an entry resolves to [`DiseaseRecord::unknown`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Human-readable disease information for one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub title: String,
    pub description: String,
}

impl DiseaseRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Record returned for class names without a curated entry
    pub fn unknown() -> Self {
        Self::new(
            "No Matching Disease Found",
            "The uploaded image does not match any known disease in the dataset.",
        )
    }
}

/// Immutable class name → disease record table
#[derive(Debug, Clone)]
pub struct DiseaseKnowledgeBase {
    records: HashMap<String, DiseaseRecord>,
    unknown: DiseaseRecord,
}

const BACTERIAL_SPOT_PEPPER: &str =
    "A bacterial infection causing dark, water-soaked spots on leaves and fruits, leading to reduced yield.";
const HEALTHY_PEPPER: &str =
    "No visible disease symptoms, vibrant green leaves, and normal fruit development.";
const YELLOW_LEAF_CURL: &str =
    "Yellow, curled leaves and stunted growth caused by a viral infection spread by whiteflies.";

/// (class name, title, description)
const BUILTIN: &[(&str, &str, &str)] = &[
    ("Pepper_bell__Bacterial_spot", "Bacterial Spot", BACTERIAL_SPOT_PEPPER),
    ("Pepper__bell___Bacterial_spot", "Bacterial Spot", BACTERIAL_SPOT_PEPPER),
    ("Pepper_bell__healthy", "Healthy Pepper Plant", HEALTHY_PEPPER),
    ("Pepper__bell___healthy", "Healthy Pepper Plant", HEALTHY_PEPPER),
    ("Potato___Early_blight", "Early Blight", "Dark brown spots with concentric rings on leaves caused by Alternaria solani. Weakens the plant and reduces tuber size."),
    ("Potato___healthy", "Healthy Potato Plant", "No signs of disease, with strong foliage and uniform tuber growth."),
    ("Potato___Late_blight", "Late Blight", "Deadly fungal disease (Phytophthora infestans) causing dark, water-soaked lesions on leaves and tubers."),
    ("Rice_BACTERIAL LEAF BLIGHT", "Bacterial Leaf Blight", "Water-soaked streaks on leaves turning yellow and brown, caused by Xanthomonas oryzae."),
    ("Rice_BROWN SPOT", "Brown Spot", "Brown lesions with yellow halos on leaves and grains caused by Cochliobolus miyabeanus."),
    ("Rice_DEFICIENCY- MAGNESIUM", "Magnesium Deficiency", "Yellowing between leaf veins, stunted growth, and poor grain filling."),
    ("Rice_DEFICIENCY- NITROGEN", "Nitrogen Deficiency", "Pale yellowing leaves and reduced tillering due to lack of nitrogen."),
    ("Rice_DEFICIENCY- NITROGEN MANGANESE POTASSIUM MAGNESIUM and ZINC", "Multiple Nutrient Deficiency", "Stunted growth, discoloration, weak stems, and poor grain formation."),
    ("Rice_DISEASE- Narrow Brown Spot NUTRIENT DEFFICIENT- Nitrogen -N- Potassium -K- Calcium -Ca-", "Narrow Brown Spot", "Small, dark brown spots with yellow halos affecting leaves, often linked to nitrogen and potassium deficiencies."),
    ("Rice_DISEASE- Bacterial Leaf Blight NUTRIENT DEFFICIENT- Silicon", "Bacterial Leaf Blight & Silicon Deficiency", "Combination of bacterial streaks and poor resistance due to silicon deficiency."),
    ("Rice_DISEASE- Hispa NUTRIENT DEFFICENCY- N-A - Integrated pest management practices-", "Hispa", "Leaf scraping damage by Hispa beetles, causing parallel white streaks, worsened by nutrient deficiencies."),
    ("Rice_DISEASE- Lead Scald NUTRIENT DEFFICIENT- Nitrogen -N- Potassium -K- Calcium -Ca- Sulfur -S-", "Leaf Scald", "Long reddish-brown lesions, exacerbated by nitrogen, potassium, calcium, and sulfur deficiencies."),
    ("Rice_DISEASE- Leaf Blast NUTRIENT DEFFICIENT- Silicon- Nitrogen -N- Potassium -K- Potassium -K- Calcium -Ca-", "Leaf Blast", "White to gray spots on leaves that expand into lesions, worsened by multiple nutrient deficiencies."),
    ("Rice_HEALTHY", "Healthy Rice Plant", "No signs of disease, strong green leaves, and normal growth."),
    ("Rice_HISPA", "Rice Hispa", "Damage by Hispa beetles, causing white parallel lines and skeletonized leaves."),
    ("Rice_LEAFBLAST", "Leaf Blast", "Gray-green lesions on leaves that enlarge into spindle-shaped spots, leading to severe yield loss."),
    ("SC_Bacterial Blight", "Sugarcane Bacterial Blight", "Leaf scald, wilting, and white streaks on leaves caused by Xanthomonas albilineans."),
    ("SC_BrownRust", "Brown Rust", "Fungal disease causing reddish-brown pustules on leaves, reducing photosynthesis and yield."),
    ("SC_Dried Leaves", "Dried Leaves", "Physiological drying due to aging, water stress, or disease."),
    ("SC_Healthy", "Healthy Sugarcane Plant", "Lush green leaves, no visible disease symptoms, and strong stalks."),
    ("SC_Mawa", "Mawa Disease", "A viral disease causing severe stunting and yellowing of sugarcane plants."),
    ("SC_Mites", "Mite Infestation", "Tiny mites sucking plant sap, leading to yellowing and poor growth."),
    ("SC_Red Rot", "Red Rot", "Severe fungal disease (Colletotrichum falcatum) causing internal red discoloration of stems, leading to rotting."),
    ("SC_RedSpot", "Red Spot", "Small reddish lesions appearing on leaves, affecting plant health."),
    ("SC_YellowLeaf", "Yellow Leaf Disease", "Yellowing of leaves due to a viral infection, reducing sugar content in canes."),
    ("Tomato__Target_Spot", "Target Spot", "Circular spots with grayish centers on leaves caused by Corynespora cassiicola."),
    ("Tomato__Tomato_mosaic_virus", "Tomato Mosaic Virus", "Mosaic-like yellow and green mottling on leaves, affecting fruit quality."),
    ("Tomato_Tomato_YellowLeaf_Curl_Virus", "Yellow Leaf Curl Virus", YELLOW_LEAF_CURL),
    ("Tomato__Tomato_YellowLeaf__Curl_Virus", "Yellow Leaf Curl Virus", YELLOW_LEAF_CURL),
    ("Tomato_Bacterial_spot", "Bacterial Spot", "Small, dark spots on leaves and fruits, caused by Xanthomonas spp."),
    ("Tomato_Early_blight", "Early Blight", "Dark spots with concentric rings caused by Alternaria solani, leading to premature leaf drop."),
    ("Tomato_healthy", "Healthy Tomato Plant", "No disease symptoms, vibrant green leaves, and uniform fruit development."),
    ("Tomato_Late_blight", "Late Blight", "A devastating fungal disease (Phytophthora infestans) causing dark, wet lesions and rapid plant death."),
    ("Tomato_Leaf_Mold", "Leaf Mold", "Yellow spots on upper leaves with mold growth underneath, caused by Passalora fulva."),
    ("Tomato_Septoria_leaf_spot", "Septoria Leaf Spot", "Numerous small, dark spots with light centers, leading to leaf drop."),
    ("Tomato_Spider_mites_Two_spotted_spider_mite", "Spider Mite Infestation", "Tiny arachnids sucking plant sap, causing yellow speckling and webbing."),
];

impl DiseaseKnowledgeBase {
    /// Build from `(class name, record)` pairs
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, DiseaseRecord)>,
        S: Into<String>,
    {
        Self {
            records: records.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            unknown: DiseaseRecord::unknown(),
        }
    }

    /// The curated crop disease table
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(class, title, description)| (*class, DiseaseRecord::new(*title, *description))),
        )
    }

    /// Load a table shaped `{"class": {"title": .., "description": ..}}`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let records: HashMap<String, DiseaseRecord> = serde_json::from_str(&json)?;
        tracing::debug!("Loaded {} disease records from {:?}", records.len(), path);
        Ok(Self::new(records))
    }

    /// Record for `class_name`, or the "no matching disease" sentinel
    pub fn lookup(&self, class_name: &str) -> &DiseaseRecord {
        self.get(class_name).unwrap_or(&self.unknown)
    }

    /// Record for `class_name` if one is curated
    pub fn get(&self, class_name: &str) -> Option<&DiseaseRecord> {
        self.records.get(class_name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entries sorted by class name
    pub fn entries(&self) -> Vec<(&str, &DiseaseRecord)> {
        let mut entries: Vec<_> = self.records.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}

impl Default for DiseaseKnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}
