use super::ToolDefinition;
use crate::config::Settings;
use serde_json::json;
use tracing::info;

/// Auxiliary capabilities the model may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// `generate_image`
    GenerateImage,
    /// `generate_tts`
    GenerateTts,
    /// `generate_stt`
    GenerateStt,
}

impl ToolKind {
    /// Function name declared to the model
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GenerateImage => "generate_image",
            Self::GenerateTts => "generate_tts",
            Self::GenerateStt => "generate_stt",
        }
    }

    /// Resolve a function name returned by the model
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generate_image" => Some(Self::GenerateImage),
            "generate_tts" => Some(Self::GenerateTts),
            "generate_stt" => Some(Self::GenerateStt),
            _ => None,
        }
    }

    /// JSON-schema declaration of the tool
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        match self {
            Self::GenerateImage => ToolDefinition {
                name: self.name().to_string(),
                description: "Generate image basing on description".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "description": {
                            "type": "string",
                            "description": "Description of the image, e.g. a house under an apple tree"
                        },
                        "size": {
                            "type": "string",
                            "enum": ["square", "portrait", "landscape"],
                            "description": "Size of the generated image. Use square if no information is provided"
                        }
                    },
                    "required": ["description"]
                }),
            },
            Self::GenerateTts => ToolDefinition {
                name: self.name().to_string(),
                description: "Generate or convert from text to speech".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "input_text": {
                            "type": "string",
                            "description": "Text to be converted to speech"
                        }
                    },
                    "required": ["input_text"]
                }),
            },
            Self::GenerateStt => ToolDefinition {
                name: self.name().to_string(),
                description: "Transcript or convert from speech to text".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        }
    }
}

/// Tools offered to the model, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Build the set from explicit capability switches
    #[must_use]
    pub fn new(image: bool, text_to_speech: bool, speech_to_text: bool) -> Self {
        let definitions = [
            (image, ToolKind::GenerateImage),
            (text_to_speech, ToolKind::GenerateTts),
            (speech_to_text, ToolKind::GenerateStt),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, kind)| kind.definition())
        .collect();
        Self { definitions }
    }

    /// Build the set from the capability flags and log which are enabled
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let image = settings.image_generation_enabled();
        let tts = settings.text_to_speech_enabled();
        let stt = settings.speech_to_text_enabled();

        info!("IMAGE_GENERATION: {}", enabled_label(image));
        info!("TEXT_TO_SPEECH: {}", enabled_label(tts));
        info!("SPEECH_TO_TEXT: {}", enabled_label(stt));

        Self::new(image, tts, stt)
    }

    /// Declarations in a stable order
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// True if no capability is enabled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

const fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for kind in [
            ToolKind::GenerateImage,
            ToolKind::GenerateTts,
            ToolKind::GenerateStt,
        ] {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("generate_video"), None);
    }

    #[test]
    fn test_tool_set_follows_flags() {
        let set = ToolSet::new(true, false, true);
        let names: Vec<&str> = set.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["generate_image", "generate_stt"]);

        assert!(ToolSet::new(false, false, false).is_empty());
    }

    #[test]
    fn test_image_declaration_schema() {
        let def = ToolKind::GenerateImage.definition();
        assert_eq!(def.parameters["required"], json!(["description"]));
        assert_eq!(
            def.parameters["properties"]["size"]["enum"],
            json!(["square", "portrait", "landscape"])
        );
    }
}
