/// Which client the report is laid out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVariant {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Original,
    Mask,
}

/// One image in the "Clinical Images" section. Positions are millimetres
/// from the left page edge.
#[derive(Debug, Clone, Copy)]
pub struct ImageSlot {
    pub kind: SlotKind,
    pub x: f64,
    pub caption: &'static str,
    pub error_label: &'static str,
}

#[derive(Debug, Clone)]
pub struct ReportLayout {
    pub variant: ReportVariant,
    pub slots: Vec<ImageSlot>,
    pub image_size: f64,
    pub include_medications: bool,
    pub download_prefix: &'static str,
}

const ORIGINAL_CAPTION: &str = "Original Image";

impl ReportLayout {
    /// Single centered original plus a medications section.
    pub fn mobile() -> Self {
        Self {
            variant: ReportVariant::Mobile,
            slots: vec![ImageSlot {
                kind: SlotKind::Original,
                x: 60.0,
                caption: ORIGINAL_CAPTION,
                error_label: ORIGINAL_CAPTION,
            }],
            image_size: 90.0,
            include_medications: true,
            download_prefix: "AI_Report_",
        }
    }

    /// Original and segmentation mask side by side, no medications.
    pub fn desktop() -> Self {
        Self {
            variant: ReportVariant::Desktop,
            slots: vec![
                ImageSlot {
                    kind: SlotKind::Original,
                    x: 20.0,
                    caption: ORIGINAL_CAPTION,
                    error_label: ORIGINAL_CAPTION,
                },
                ImageSlot {
                    kind: SlotKind::Mask,
                    x: 115.0,
                    caption: "Segmentation Mask",
                    error_label: "Mask",
                },
            ],
            image_size: 75.0,
            include_medications: false,
            download_prefix: "AI_Report_Desktop_",
        }
    }

    pub fn for_variant(variant: ReportVariant) -> Self {
        match variant {
            ReportVariant::Mobile => Self::mobile(),
            ReportVariant::Desktop => Self::desktop(),
        }
    }

    pub fn needs_mask(&self) -> bool {
        self.slots.iter().any(|slot| slot.kind == SlotKind::Mask)
    }

    /// The chart section follows the medications one when that is present.
    pub fn chart_section_number(&self) -> u8 {
        if self.include_medications { 5 } else { 4 }
    }

    pub fn download_name(&self, file_name: &str) -> String {
        let stem = file_name.replace(".jpg", "").replace(".png", "");
        format!("{}{}.pdf", self.download_prefix, stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_differ_only_in_parameters() {
        let mobile = ReportLayout::mobile();
        let desktop = ReportLayout::desktop();

        assert!(!mobile.needs_mask());
        assert!(desktop.needs_mask());
        assert_eq!(mobile.chart_section_number(), 5);
        assert_eq!(desktop.chart_section_number(), 4);
        assert_eq!(desktop.slots.len(), 2);
        assert_eq!(
            ReportLayout::for_variant(ReportVariant::Desktop).variant,
            ReportVariant::Desktop
        );
    }

    #[test]
    fn download_names_strip_extensions() {
        assert_eq!(
            ReportLayout::mobile().download_name("COVID-12.png"),
            "AI_Report_COVID-12.pdf"
        );
        assert_eq!(
            ReportLayout::desktop().download_name("Normal-3.jpg"),
            "AI_Report_Desktop_Normal-3.pdf"
        );
        assert_eq!(
            ReportLayout::mobile().download_name("scan.jpeg"),
            "AI_Report_scan.jpeg.pdf"
        );
    }
}
