use std::fmt::Write;

use super::TemplateView;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            '°' => out.push_str("\\textdegree{}"),
            _ => out.push(c),
        }
    }
    out
}

pub(super) fn render(view: &TemplateView) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("\\documentclass[11pt]{article}\n");
    out.push_str("\\usepackage[utf8]{inputenc}\n\\usepackage{textcomp}\n\\usepackage{enumitem}\n\\usepackage[margin=2.5cm]{geometry}\n");
    out.push_str("\\begin{document}\n\n");
    let _ = writeln!(out, "\\section*{{{}}}", escape(&view.title));

    if let Some(description) = &view.description {
        let _ = writeln!(out, "\\emph{{{}}}\n", escape(description));
    }

    let mut times = Vec::new();
    if let Some(prep) = &view.prep_time {
        times.push(format!("Prep: {}", prep));
    }
    if let Some(cook) = &view.cook_time {
        times.push(format!("Cook: {}", cook));
    }
    if let Some(total) = &view.total_time {
        times.push(format!("Total: {}", total));
    }
    let servings = view
        .servings
        .map(|s| format!("{} servings", s))
        .unwrap_or_else(|| "Servings not specified".to_string());
    let mut meta = vec![servings];
    if times.is_empty() {
        meta.push("Time not specified".to_string());
    } else {
        meta.push(times.join(" | "));
    }
    if let Some(difficulty) = &view.difficulty {
        meta.push(difficulty.clone());
    }
    let _ = writeln!(out, "\\noindent {}\n", escape(&meta.join(" \u{2022} ")));

    out.push_str("\\subsection*{Ingredients}\n\\begin{itemize}[noitemsep]\n");
    for ingredient in &view.ingredients {
        let _ = writeln!(out, "  \\item {}", escape(&ingredient.line()));
    }
    out.push_str("\\end{itemize}\n\n");

    out.push_str("\\subsection*{Instructions}\n\\begin{enumerate}\n");
    for step in &view.instructions {
        let _ = writeln!(out, "  \\item {}", escape(&step.text));
    }
    out.push_str("\\end{enumerate}\n\n");

    if !view.tags.is_empty() {
        let _ = writeln!(out, "\\noindent\\textit{{Tags: {}}}\n", escape(&view.tags.join(", ")));
    }
    let _ = writeln!(
        out,
        "\\vfill\n\\noindent\\footnotesize Source: \\texttt{{{}}} \\\\ Generated {}",
        escape(&view.source_url),
        escape(&view.generated_at)
    );
    out.push_str("\n\\end{document}\n");
    out
}
