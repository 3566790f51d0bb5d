//! Renders generated images as HTML blocks for appending to an article.

use crate::models::GeneratedImageMap;

/// One `<p><img …/></p>` per slot, in map order.
pub fn image_blocks(images: &GeneratedImageMap, focus_keyword: &str) -> String {
    images
        .iter()
        .map(|(slot, reference)| {
            let alt = format!("{} for {}", slot.replacen('_', " ", 1), focus_keyword);
            format!(
                "<p><img src=\"{}\" alt=\"{}\" class=\"generated-image\" /></p>\n",
                escape_attribute(reference.as_str()),
                escape_attribute(&alt)
            )
        })
        .collect()
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageReference;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_map_renders_nothing() {
        assert_eq!(image_blocks(&GeneratedImageMap::new(), "toast"), "");
    }

    #[test]
    fn test_blocks_follow_map_order() {
        let mut images = GeneratedImageMap::new();
        images.insert(
            "hero_image".to_string(),
            ImageReference::new("https://img.test/hero.webp"),
        );
        images.insert(
            "step1_image".to_string(),
            ImageReference::new("https://img.test/step1.webp"),
        );

        assert_eq!(
            image_blocks(&images, "toast"),
            "<p><img src=\"https://img.test/hero.webp\" alt=\"hero image for toast\" class=\"generated-image\" /></p>\n\
             <p><img src=\"https://img.test/step1.webp\" alt=\"step1 image for toast\" class=\"generated-image\" /></p>\n"
        );
    }

    #[test]
    fn test_only_first_underscore_is_replaced() {
        let mut images = GeneratedImageMap::new();
        images.insert("final_dish_image".to_string(), ImageReference::new("a.webp"));

        assert!(image_blocks(&images, "pie").contains("alt=\"final dish_image for pie\""));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let mut images = GeneratedImageMap::new();
        images.insert(
            "hero".to_string(),
            ImageReference::new("https://img.test/a.webp?x=1&y=\"2\""),
        );

        let html = image_blocks(&images, "mac & <cheese>");
        assert!(html.contains("src=\"https://img.test/a.webp?x=1&amp;y=&quot;2&quot;\""));
        assert!(html.contains("alt=\"hero for mac &amp; &lt;cheese&gt;\""));
    }
}
