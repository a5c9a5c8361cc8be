use highlight_core::{ByteRange, Document, StyleCategory};
use highlight_core_treesitter::{
    GrammarConfig, GrammarRegistry, Highlighter, HighlighterConfig, StyleMap,
};
use std::thread;
use std::time::Duration;

const NAMES: [&str; 6] = ["comment", "string", "type", "function", "keyword", "variable"];

fn main() {
    env_logger::init();

    let mut doc = Document::new(
        r#"
// comment
fn add(a: i32, b: i32) -> i32 {
    let s = "hi";
    a + b
}
"#,
    );

    let mut registry = GrammarRegistry::new();
    registry.register(
        GrammarConfig::new(
            "rust",
            tree_sitter_rust::LANGUAGE.into(),
            tree_sitter_rust::HIGHLIGHTS_QUERY,
        )
        .with_file_extensions(["rs"]),
    );
    let styles = StyleMap::new().with_styles([
        ("comment", 0),
        ("string", 1),
        ("type", 2),
        ("function", 3),
        ("keyword", 4),
        ("variable", 5),
    ]);

    let mut highlighter = Highlighter::new(doc.snapshot(), styles, HighlighterConfig::default());
    let language = registry
        .language_for_extension("rs")
        .expect("rust grammar registered");
    highlighter
        .set_language_from(&registry, language)
        .expect("load rust grammar");
    highlighter.subscribe(|ranges| {
        log::info!("{} style range(s) changed", ranges.len());
    });
    highlighter.attach().expect("start highlighter");

    let edit = doc.insert(1, "// another comment\n").expect("insert");
    highlighter.text_did_change(doc.snapshot(), vec![edit]);
    while !highlighter.is_idle() {
        highlighter.poll();
        thread::sleep(Duration::from_millis(1));
    }

    let text = doc.text().to_string();
    for range in highlighter.query(ByteRange::new(0, doc.len_bytes())) {
        if let StyleCategory::Styled(id) = range.category {
            println!(
                "{:>4}..{:<4} {:<9} {:?}",
                range.range.start,
                range.range.end,
                NAMES[id as usize],
                &text[range.range.start..range.range.end]
            );
        }
    }
}
