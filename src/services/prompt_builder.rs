// src/services/prompt_builder.rs
use crate::models::{OutputFormat, OutputSettings, Selection, UploadedImage};

pub const DEFAULT_INSTRUCTION: &str = "Translate all visible text";

/// Prompt text for one image plus the size hint for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub text: String,
    pub image_size: &'static str,
}

/// Boxes as `[ymin, xmin, ymax, xmax]` in the normalized space, in the order
/// they were drawn.
pub fn format_boxes(selections: &[Selection]) -> String {
    selections
        .iter()
        .map(|s| {
            format!(
                "[ymin: {}, xmin: {}, ymax: {}, xmax: {}]",
                s.y,
                s.x,
                s.y_max(),
                s.x_max()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn restriction_clause(selections: &[Selection]) -> String {
    if selections.is_empty() {
        return "Translate all visible text in the image.".to_string();
    }
    format!(
        "CRITICAL RESTRICTION: Only translate and modify text located inside these normalized \
         coordinate boxes (0-1000 scale): {}. Text outside these boxes must not be changed. \
         The background, colors and every unselected region must stay pixel-identical to the input.",
        format_boxes(selections)
    )
}

pub fn export_directive(settings: &OutputSettings) -> String {
    match settings.format {
        OutputFormat::Png => "Export as lossless PNG.".to_string(),
        OutputFormat::Jpeg => format!(
            "Export as high-quality JPEG (Quality: {}%).",
            settings.quality
        ),
    }
}

pub fn effective_instruction(instruction: &str) -> &str {
    let trimmed = instruction.trim();
    if trimmed.is_empty() {
        DEFAULT_INSTRUCTION
    } else {
        trimmed
    }
}

/// Prefixes the user's instruction with an explicit target-language directive.
pub fn language_instruction(language: &str, instruction: &str) -> String {
    let extra = instruction.trim();
    if extra.is_empty() {
        format!("Translate all text in the images to {language} language.")
    } else {
        format!("Translate all text in the images to {language} language. {extra}")
    }
}

pub fn build(instruction: &str, image: &UploadedImage, settings: &OutputSettings) -> PromptPayload {
    let text = [
        format!("TASK: {}", effective_instruction(instruction)),
        "TARGET LANGUAGE: Every translated string must be written in the requested language."
            .to_string(),
        "STYLING: Match the original font family, size, color and orientation exactly.".to_string(),
        restriction_clause(&image.selections),
        export_directive(settings),
        "OUTPUT: Provide the modified image.".to_string(),
    ]
    .join("\n");

    PromptPayload {
        text,
        image_size: settings.resolution.service_hint(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;

    fn image_with(selections: Vec<Selection>) -> UploadedImage {
        let mut img = UploadedImage::new("menu.png", "image/png", b"png", (10, 10));
        img.selections = selections;
        img
    }

    #[test]
    fn boxes_use_min_plus_size_for_max() {
        let boxes = format_boxes(&[
            Selection { x: 100, y: 200, width: 300, height: 50 },
            Selection { x: 0, y: 0, width: 10, height: 10 },
        ]);
        assert_eq!(
            boxes,
            "[ymin: 200, xmin: 100, ymax: 250, xmax: 400], [ymin: 0, xmin: 0, ymax: 10, xmax: 10]"
        );
    }

    #[test]
    fn no_selection_means_whole_image() {
        let payload = build("Make it French", &image_with(vec![]), &OutputSettings::default());
        assert!(payload.text.contains("Translate all visible text in the image."));
        assert!(!payload.text.contains("CRITICAL RESTRICTION"));
        assert!(payload.text.contains("TASK: Make it French"));
    }

    #[test]
    fn selections_produce_restriction_clause() {
        let payload = build(
            "",
            &image_with(vec![Selection { x: 1, y: 2, width: 3, height: 4 }]),
            &OutputSettings::default(),
        );
        assert!(payload.text.contains("CRITICAL RESTRICTION"));
        assert!(payload.text.contains("[ymin: 2, xmin: 1, ymax: 6, xmax: 4]"));
        assert!(payload.text.contains(&format!("TASK: {DEFAULT_INSTRUCTION}")));
    }

    #[test]
    fn export_and_resolution_follow_settings() {
        let settings = OutputSettings {
            format: OutputFormat::Jpeg,
            quality: 72,
            resolution: Resolution::FourK,
            ..OutputSettings::default()
        };
        let payload = build("x", &image_with(vec![]), &settings);
        assert!(payload.text.contains("Quality: 72%"));
        assert_eq!(payload.image_size, "4K");

        let png = build("x", &image_with(vec![]), &OutputSettings::default());
        assert!(png.text.contains("lossless PNG"));
        assert_eq!(png.image_size, "1K");
    }

    #[test]
    fn language_directive_prefixes_instruction() {
        assert_eq!(
            language_instruction("German", " formal tone "),
            "Translate all text in the images to German language. formal tone"
        );
        assert_eq!(
            language_instruction("Korean", ""),
            "Translate all text in the images to Korean language."
        );
    }
}
