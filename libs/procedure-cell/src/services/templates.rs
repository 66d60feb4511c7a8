// libs/procedure-cell/src/services/templates.rs
use crate::models::Step;

type Template = &'static [(&'static str, &'static str)];

const VAMANA: Template = &[
    ("Assessment", "Confirm fitness for emesis therapy and record baseline vitals"),
    ("Snehapana", "Internal oleation with medicated ghee"),
    ("Abhyanga & Swedana", "Full-body oil massage followed by steam"),
    ("Vamana", "Therapeutic emesis under observation"),
    ("Samsarjana Krama", "Graduated diet instructions"),
];

const VIRECHANA: Template = &[
    ("Assessment", "Confirm fitness for purgation and record baseline vitals"),
    ("Snehapana", "Internal oleation with medicated ghee"),
    ("Abhyanga & Swedana", "Full-body oil massage followed by steam"),
    ("Virechana", "Administer purgative and monitor evacuations"),
    ("Samsarjana Krama", "Graduated diet instructions"),
];

const BASTI: Template = &[
    ("Abhyanga", "Oil massage of the lower back and abdomen"),
    ("Swedana", "Local steam"),
    ("Basti", "Administer medicated enema"),
    ("Retention & Observation", "Monitor retention time and expulsion"),
    ("Rest", "Supine rest before discharge"),
];

const NASYA: Template = &[
    ("Face & Neck Massage", "Gentle oil massage of face, neck and shoulders"),
    ("Steam", "Facial steam to open the channels"),
    ("Nasya", "Instil medicated oil into each nostril"),
    ("Gargling & Dhumapana", "Warm water gargle and herbal smoke inhalation"),
];

const RAKTAMOKSHANA: Template = &[
    ("Assessment", "Check haemoglobin and clotting history"),
    ("Preparation", "Prepare site and leeches or instruments"),
    ("Raktamokshana", "Therapeutic bloodletting"),
    ("Wound Care & Observation", "Dress the site and observe"),
];

const SHIRODHARA: Template = &[
    ("Preparation & Head Massage", "Position the patient and massage scalp"),
    ("Shirodhara", "Continuous stream of warm oil on the forehead"),
    ("Rest", "Quiet rest with eyes closed"),
    ("Head Wash", "Remove excess oil with herbal powder"),
];

const ABHYANGA: Template = &[
    ("Preparation", "Warm the oil and prepare the table"),
    ("Abhyanga", "Synchronised full-body oil massage"),
    ("Swedana", "Herbal steam"),
    ("Rest & Bath", "Rest followed by a warm bath"),
];

const GENERIC: Template = &[
    ("Preparation", "Prepare the room and the patient"),
    ("Therapy", "Administer the therapy"),
    ("Rest & Observation", "Observe the patient after therapy"),
    ("Post-therapy Advice", "Explain diet and activity restrictions"),
];

fn template_for(therapy_type: &str) -> Template {
    let therapy = therapy_type.trim().to_ascii_lowercase();
    [
        ("vamana", VAMANA),
        ("virechana", VIRECHANA),
        ("basti", BASTI),
        ("nasya", NASYA),
        ("raktamokshana", RAKTAMOKSHANA),
        ("shirodhara", SHIRODHARA),
        ("abhyanga", ABHYANGA),
    ]
    .into_iter()
    .find(|(key, _)| therapy.contains(key))
    .map(|(_, template)| template)
    .unwrap_or(GENERIC)
}

/// Standard step list for a therapy, falling back to a generic list.
pub fn default_steps(therapy_type: &str) -> Vec<Step> {
    template_for(therapy_type)
        .iter()
        .map(|(name, description)| Step::new(name, Some(description)))
        .collect()
}
