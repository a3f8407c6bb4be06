mod common;

use common::*;
use docx_merge::assemble::{
    CombineStrategy, PlainCopy, StructuredCopy, combine, combine_with, copy_block, merge_separate, plain_copy,
    verify_combined,
};
use docx_merge::model::{Block, Document, Paragraph, Run, Style, StyleKind, StyleRegistry, Table};
use docx_merge::{AppendError, Assembled, Error, OutputMode, Record, assemble};

fn people(n: usize) -> Vec<Record> {
    (1..=n)
        .map(|i| {
            let name = format!("Person {i}");
            let city = format!("City {i}");
            record(&[("name", name.as_str()), ("city", city.as_str())])
        })
        .collect()
}

fn letter() -> Document {
    let body = [p(&r("Dear {{name}},")), p(&r_bold("Lives in {{city}}"))].concat();
    Fixture::new(body)
        .header(p(&r("Letter for {{name}}")))
        .template()
        .document()
        .clone()
}

#[test]
fn separate_mode_yields_one_document_per_record_in_order() {
    let template = letter();
    let records = people(5);
    let Assembled::Separate(docs) = assemble(&template, &records, OutputMode::Separate).unwrap() else {
        panic!("expected separate output");
    };
    assert_eq!(docs.len(), 5);
    for (i, doc) in docs.iter().enumerate() {
        let text = all_text(doc);
        assert_eq!(text[0], format!("Dear Person {},", i + 1));
        assert_eq!(text[1], format!("Lives in City {}", i + 1));
        assert_eq!(text[2], format!("Letter for Person {}", i + 1));
    }
}

#[test]
fn template_is_not_modified_by_merging() {
    let template = letter();
    let before = template.clone();
    let _ = merge_separate(&template, &people(3));
    let _ = combine(&template, &people(3)).unwrap();
    assert_eq!(template, before);
}

#[test]
fn combined_mode_separates_records_with_page_breaks() {
    let template = letter();
    let doc = combine(&template, &people(3)).unwrap();

    assert_eq!(doc.body.len(), 3 * 2 + 2);
    assert_eq!(page_breaks(&doc), 2);
    assert_eq!(doc.body[2], Block::PageBreak);
    assert_eq!(doc.body[5], Block::PageBreak);

    let texts: Vec<String> = body_paragraphs(&doc).iter().map(|p| p.text()).collect();
    assert_eq!(
        texts,
        vec![
            "Dear Person 1,",
            "Lives in City 1",
            "Dear Person 2,",
            "Lives in City 2",
            "Dear Person 3,",
            "Lives in City 3",
        ]
    );
    assert!(body_paragraphs(&doc)[3].runs.iter().all(|r| r.formatting == bold()));
}

#[test]
fn combined_single_record_has_no_separator() {
    let doc = combine(&letter(), &people(1)).unwrap();
    assert_eq!(doc.body.len(), 2);
    assert_eq!(page_breaks(&doc), 0);
}

#[test]
fn combined_header_is_merged_with_the_first_record() {
    let doc = combine(&letter(), &people(2)).unwrap();
    let headers: Vec<String> = doc
        .header_footers()
        .flat_map(|hf| {
            let mut out = Vec::new();
            docx_merge::model::visit_paragraphs(&hf.blocks, &mut |p| out.push(p.text()));
            out
        })
        .collect();
    assert!(headers.contains(&"Letter for Person 1".to_string()));
    assert!(headers.contains(&"Footer".to_string()));
}

#[test]
fn tables_keep_their_shape_in_combined_output() {
    let body = [p(&r("Order for {{name}}")), table(3, &["{{name}}", "{{city}}", "x", "y"])].concat();
    let template = Fixture::new(body).template().document().clone();
    let doc = combine(&template, &people(2)).unwrap();

    let tables = body_tables(&doc);
    assert_eq!(tables.len(), 2);
    for (i, t) in tables.iter().enumerate() {
        assert_eq!(t.shape(), (3, 4));
        assert_eq!(t.style.as_deref(), Some("TableGrid"));
        assert_eq!(t.rows[2].cells[0].text(), format!("Person {}", i + 1));
        assert_eq!(t.rows[0].cells[1].text(), format!("City {}", i + 1));
        assert_eq!(t.rows[1].cells[0].shading, template.tables()[0].rows[1].cells[0].shading);
    }
}

#[test]
fn undefined_style_reference_is_kept_for_every_record() {
    let template = Fixture::new(p_styled("Missing", &r_bold("Hi {{name}}"))).template().document().clone();
    let doc = combine(&template, &people(2)).unwrap();

    let paras = body_paragraphs(&doc);
    assert_eq!(paras.len(), 2);
    for (i, para) in paras.iter().enumerate() {
        assert_eq!(para.style.as_deref(), Some("Missing"));
        assert_eq!(para.text(), format!("Hi Person {}", i + 1));
        assert!(para.runs.iter().all(|r| r.formatting.bold == Some(true)));
    }
    assert!(!doc.styles.contains("Missing"));
    assert_eq!(doc.body[1], Block::PageBreak);
}

#[test]
fn nested_tables_are_merged_and_keep_their_shape() {
    let template = Fixture::new(nested_table("{{name}}")).template().document().clone();
    let doc = combine(&template, &people(2)).unwrap();

    let tables = doc.tables();
    assert_eq!(tables.len(), 4);
    assert_eq!(tables[0].shape(), (1, 2));
    assert_eq!(tables[1].shape(), (2, 2));
    assert_eq!(tables[2].shape(), (1, 2));
    assert_eq!(tables[3].shape(), (2, 2));
    assert_eq!(tables[1].rows[1].cells[0].text(), "Person 1");
    assert_eq!(tables[3].rows[1].cells[0].text(), "Person 2");
    assert_eq!(tables[3].grid, vec![1500, 1500]);
}

#[test]
fn plain_copy_keeps_nested_tables() {
    let template = Fixture::new(nested_table("inner")).template().document().clone();
    let copy = plain_copy(&template.body[0]);
    let Block::Table(outer) = &copy else {
        panic!("expected a table");
    };
    assert_eq!(outer.shape(), (1, 2));
    assert_eq!(outer.style, None);

    let holder = &outer.rows[0].cells[1];
    let Some(Block::Table(inner)) = holder.blocks.first() else {
        panic!("expected the nested table to survive");
    };
    assert_eq!(inner.shape(), (2, 2));
    assert_eq!(inner.rows[1].cells[0].text(), "inner");
    assert!(matches!(holder.blocks.last(), Some(Block::Paragraph(_))));
}

#[test]
fn verify_detects_reshaped_nested_table() {
    let template = Fixture::new(nested_table("{{name}}")).template().document().clone();
    let good = combine(&template, &people(2)).unwrap();
    assert!(verify_combined(&template, &good, 2).is_ok());

    let mut reshaped = good.clone();
    if let Block::Table(outer) = &mut reshaped.body[2]
        && let Some(Block::Table(inner)) = outer.rows[0].cells[1].blocks.first_mut()
    {
        inner.rows.pop();
    }
    assert!(matches!(verify_combined(&template, &reshaped, 2), Err(Error::Assembly(_))));
}

#[test]
fn plain_strategy_keeps_text_and_table_dimensions() {
    let body = [p_styled("Heading1", &r_bold("{{name}}")), table(2, &["{{city}}", "b"])].concat();
    let template = Fixture::new(body).template().document().clone();
    let doc = combine_with(&[&PlainCopy], &template, &people(2)).unwrap();

    assert_eq!(doc.body.len(), 5);
    let paras = body_paragraphs(&doc);
    assert_eq!(paras[0].text(), "Person 1");
    assert_eq!(paras[1].text(), "Person 2");
    assert!(paras.iter().all(|p| p.style.is_none()));
    assert!(paras.iter().flat_map(|p| &p.runs).all(|r| r.formatting.is_unset()));
    for t in body_tables(&doc) {
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.style, None);
    }
    assert_eq!(body_tables(&doc)[1].rows[0].cells[0].text(), "City 2");
}

struct Failing(Error);

impl CombineStrategy for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn combine(&self, _template: &Document, _records: &[Record]) -> Result<Document, Error> {
        Err(match &self.0 {
            Error::NoRecords => Error::NoRecords,
            other => Error::Assembly(other.to_string()),
        })
    }
}

#[test]
fn failed_strategy_falls_through_to_the_next() {
    let template = letter();
    let failing = Failing(Error::Assembly("broken".into()));
    let doc = combine_with(&[&failing, &StructuredCopy], &template, &people(2)).unwrap();
    assert_eq!(doc.body.len(), 5);

    let err = combine_with(&[&failing], &template, &people(2)).unwrap_err();
    assert!(matches!(err, Error::Assembly(msg) if msg.contains("failing")));
}

#[test]
fn no_records_is_not_retried() {
    let failing = Failing(Error::NoRecords);
    let err = combine_with(&[&failing, &StructuredCopy], &letter(), &people(2)).unwrap_err();
    assert!(matches!(err, Error::NoRecords));
}

#[test]
fn empty_inputs_are_rejected() {
    assert!(matches!(
        assemble(&letter(), &[], OutputMode::Combined),
        Err(Error::NoRecords)
    ));
    assert!(matches!(
        assemble(&Document::default(), &people(1), OutputMode::Separate),
        Err(Error::EmptyTemplate)
    ));
}

#[test]
fn verify_detects_missing_separator_and_reshaped_tables() {
    let body = [p(&r("{{name}}")), table(2, &["a", "b"])].concat();
    let template = Fixture::new(body).template().document().clone();
    let good = combine(&template, &people(2)).unwrap();
    assert!(verify_combined(&template, &good, 2).is_ok());

    let mut missing = good.clone();
    missing.body[2] = Block::Paragraph(Paragraph::default());
    assert!(matches!(verify_combined(&template, &missing, 2), Err(Error::Assembly(_))));

    let mut reshaped = good.clone();
    if let Block::Table(t) = &mut reshaped.body[4] {
        t.rows.pop();
    }
    assert!(matches!(verify_combined(&template, &reshaped, 2), Err(Error::Assembly(_))));

    assert!(verify_combined(&template, &good, 3).is_err());
}

#[test]
fn copy_block_registers_styles_once() {
    let source = StyleRegistry::from_styles(vec![Style {
        id: "Quote".into(),
        kind: StyleKind::Paragraph,
        xml: r#"<w:style w:type="paragraph" w:styleId="Quote"/>"#.into(),
    }]);
    let mut target = Document::default();
    let para = Block::Paragraph(Paragraph {
        style: Some("Quote".into()),
        ..Paragraph::with_runs(vec![Run::plain("x")])
    });

    copy_block(&para, &source, &mut target).unwrap();
    copy_block(&para, &source, &mut target).unwrap();
    assert_eq!(target.styles.len(), 1);
    assert_eq!(target.styles.added().count(), 1);

    let unknown = Block::Paragraph(Paragraph {
        style: Some("Nope".into()),
        ..Paragraph::default()
    });
    assert_eq!(copy_block(&unknown, &source, &mut target), Ok(unknown.clone()));
    assert_eq!(target.styles.len(), 1);

    let conflicting = StyleRegistry::from_styles(vec![Style {
        id: "Quote".into(),
        kind: StyleKind::Table,
        xml: r#"<w:style w:type="table" w:styleId="Quote"/>"#.into(),
    }]);
    let table = Block::Table(Table {
        style: Some("Quote".into()),
        ..Table::default()
    });
    assert_eq!(
        copy_block(&table, &conflicting, &mut target),
        Err(AppendError::StyleKindMismatch {
            id: "Quote".into(),
            expected: StyleKind::Table,
            found: StyleKind::Paragraph,
        })
    );
}

#[test]
fn copy_block_rejects_section_break_without_target_section() {
    let para = Block::Paragraph(Paragraph {
        section_break: Some(0),
        ..Paragraph::default()
    });
    let mut target = Document::default();
    assert_eq!(
        copy_block(&para, &StyleRegistry::default(), &mut target),
        Err(AppendError::DanglingSection(0))
    );
    assert_eq!(plain_copy(&para), Block::Paragraph(Paragraph::default()));
}

#[test]
fn output_mode_parses_aliases() {
    assert_eq!("separate".parse::<OutputMode>(), Ok(OutputMode::Separate));
    assert_eq!("Single".parse::<OutputMode>(), Ok(OutputMode::Combined));
    assert!("both".parse::<OutputMode>().is_err());
}
