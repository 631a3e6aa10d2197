use shared::ClassLabel;

/// Canned guidance printed in the analysis and medications sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Guidance {
    pub recommendations: &'static str,
    pub medications: &'static [&'static str],
}

const INCONCLUSIVE: Guidance = Guidance {
    recommendations: "Inconclusive diagnosis.",
    medications: &["Pending evaluation."],
};

pub fn guidance_for_label(label: ClassLabel) -> Guidance {
    match label {
        ClassLabel::Covid => Guidance {
            recommendations: "Immediate isolation is required. Start oxygen saturation monitoring \
                              and antiviral treatment under medical supervision.",
            medications: &[
                "Specific antivirals (e.g. Paxlovid or similar)",
                "Dexamethasone (if severe)",
                "Paracetamol",
            ],
        },
        ClassLabel::ViralPneumonia => Guidance {
            recommendations: "Supportive treatment. Monitoring respiratory function is essential \
                              to prevent complications.",
            medications: &[
                "Oxygen and ventilation (if needed)",
                "Antipyretics (for fever)",
                "Hydration and rest",
            ],
        },
        ClassLabel::LungOpacity => Guidance {
            recommendations: "The opacity requires further evaluation (possible CT scan or \
                              follow-up). It may be nonspecific. Close monitoring.",
            medications: &[
                "Analgesics (if there is pain)",
                "Pending full medical evaluation.",
            ],
        },
        ClassLabel::Normal => Guidance {
            recommendations: "Clear radiograph. There is no evidence of acute lung disease in \
                              this study.",
            medications: &["None."],
        },
    }
}

/// Looks up guidance by any spelling of a class name (`COVID`,
/// `viral_pneumonia`, ...). Unknown names get the inconclusive text.
pub fn guidance_for(class_name: &str) -> Guidance {
    class_name
        .trim()
        .to_lowercase()
        .parse::<ClassLabel>()
        .map(guidance_for_label)
        .unwrap_or(INCONCLUSIVE)
}
