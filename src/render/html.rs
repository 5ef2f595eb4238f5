use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

use super::TemplateView;

const STYLE: &str = "body{font-family:Georgia,serif;max-width:760px;margin:2rem auto;padding:0 1rem;color:#222}\
h1{margin-bottom:.25rem}.meta{color:#666;font-size:.9rem}.meta span{margin-right:1rem}\
.ingredients li{margin:.2rem 0}.qty{font-weight:bold}.prep{color:#666}\
.steps li{margin:.6rem 0;line-height:1.5}.tags span{background:#eee;border-radius:3px;padding:0 .4rem;margin-right:.3rem}\
footer{margin-top:2rem;color:#999;font-size:.8rem}";

pub(super) fn render(view: &TemplateView) -> String {
    let mut out = String::with_capacity(4096);
    let title = encode_text(&view.title);

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", title);
    let _ = writeln!(out, "<style>{}</style>", STYLE);
    out.push_str("</head>\n<body>\n<article class=\"recipe\">\n");
    let _ = writeln!(out, "<h1>{}</h1>", title);

    if let Some(description) = &view.description {
        let _ = writeln!(out, "<p class=\"description\">{}</p>", encode_text(description));
    }

    let meta: Vec<String> = [
        ("Servings", view.servings.map(|s| s.to_string())),
        ("Prep", view.prep_time.clone()),
        ("Cook", view.cook_time.clone()),
        ("Total", view.total_time.clone()),
        ("Difficulty", view.difficulty.clone()),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value.map(|v| format!("<span>{}: {}</span>", label, encode_text(&v)))
    })
    .collect();
    if !meta.is_empty() {
        let _ = writeln!(out, "<p class=\"meta\">{}</p>", meta.join(""));
    }

    if let Some(image_url) = &view.image_url {
        let _ = writeln!(
            out,
            "<img src=\"{}\" alt=\"{}\" style=\"max-width:{}px;width:100%\">",
            encode_double_quoted_attribute(image_url),
            encode_double_quoted_attribute(&view.title),
            view.max_image_size
        );
    }

    out.push_str("<h2>Ingredients</h2>\n<ul class=\"ingredients\">\n");
    for ingredient in &view.ingredients {
        out.push_str("<li>");
        let amount: Vec<&str> = ingredient
            .quantity
            .iter()
            .chain(ingredient.unit.iter())
            .map(String::as_str)
            .collect();
        if !amount.is_empty() {
            let _ = write!(out, "<span class=\"qty\">{}</span> ", encode_text(&amount.join(" ")));
        }
        out.push_str(&encode_text(&ingredient.name));
        if let Some(preparation) = &ingredient.preparation {
            let _ = write!(out, "<span class=\"prep\">, {}</span>", encode_text(preparation));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");

    out.push_str("<h2>Instructions</h2>\n<ol class=\"steps\">\n");
    for step in &view.instructions {
        let _ = writeln!(out, "<li value=\"{}\">{}</li>", step.step, encode_text(&step.text));
    }
    out.push_str("</ol>\n");

    if !view.tags.is_empty() {
        out.push_str("<p class=\"tags\">");
        for tag in &view.tags {
            let _ = write!(out, "<span>{}</span>", encode_text(tag));
        }
        out.push_str("</p>\n");
    }

    let source = encode_double_quoted_attribute(&view.source_url);
    let _ = writeln!(
        out,
        "<footer>Source: <a href=\"{}\">{}</a><br>Generated {}</footer>",
        source,
        encode_text(&view.source_url),
        encode_text(&view.generated_at)
    );
    out.push_str("</article>\n</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_view;

    #[test]
    fn test_html_escapes_content() {
        let html = render(&sample_view());
        assert!(html.contains("<title>Fish &amp; Chips</title>"));
        assert!(html.contains("Crispy &lt;and&gt; hot"));
        assert!(html.contains("<span class=\"qty\">1/2 cup</span> Flour"));
        assert!(html.contains("href=\"https://example.com/fish?a=1&amp;b=2\""));
        assert!(html.contains("max-width:800px"));
        assert!(html.contains("<li value=\"1\">Fry at 180°C"));
    }
}
