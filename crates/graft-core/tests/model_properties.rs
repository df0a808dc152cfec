use graft_core::models::xml::XmlPoint;
use graft_core::models::{LineModel, XmlModel};
use graft_core::{Edit, Location, Model, Models, MutationModel, Patch, Variant};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const DOC: &str = "<unit><block>{\n  <stmt>a;</stmt>\n  <stmt>b;</stmt>\n  <if>if (x) <block>{\n    <stmt>c;</stmt>\n  }</block></if>\n  <stmt>d;</stmt>\n}</block></unit>";

fn xml() -> XmlModel {
    XmlModel::parse("t.xml", DOC).unwrap()
}

fn node_text(model: &XmlModel, kind: &str, index: usize) -> Option<String> {
    match model.point(kind, index)? {
        XmlPoint::Node(path) => model.root().find(path).map(|n| n.itertext()),
        _ => None,
    }
}

fn reference() -> Variant {
    let mut models = Models::new();
    models.insert("a.txt".into(), Model::Line(LineModel::parse("a.txt", "1\n2\n3\n4\n")));
    models.insert("t.xml".into(), Model::Xml(xml()));
    Variant::reference(models)
}

fn value_literal() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|s| format!("'{s}'")),
        (-1000i64..1000).prop_map(|i| i.to_string()),
        (-1.0e6f64..1.0e6).prop_map(|x| format!("{x:?}")),
        Just("True".to_string()),
        Just("None".to_string()),
    ]
}

fn edit_text() -> impl Strategy<Value = String> {
    let file = "[a-z]{1,4}\\.(c|txt|xml)";
    let kind = "[a-z_]{1,8}";
    let loc = (file, kind, 0usize..500).prop_map(|(f, k, i)| format!("('{f}', '{k}', {i})"));
    prop_oneof![
        loc.clone().prop_map(|t| format!("LineDeletion({t})")),
        (loc.clone(), loc.clone()).prop_map(|(t, i)| format!("LineReplacement({t}, {i})")),
        (loc.clone(), loc.clone()).prop_map(|(t, i)| format!("XmlNodeInsertion<stmt,block>({t}, {i})")),
        (loc.clone(), "[ -~&&[^'\\\\]]{0,5}").prop_map(|(t, s)| format!("SrcmlNumericSetting({t}, '{s}')")),
        (loc.clone(), "[()+*/0-9-]{1,3}", "[()+*/0-9-]{1,3}")
            .prop_map(|(t, a, b)| format!("SrcmlRelativeNumericSetting({t}, ('{a}', '{b}'))")),
        ("[a-z]{1,6}", value_literal())
            .prop_map(|(k, v)| format!("ParamSetting(('p.params', 'param', '{k}'), {v})")),
    ]
}

proptest! {
    #[test]
    fn edit_string_roundtrip(text in edit_text()) {
        let edit: Edit = text.parse().unwrap();
        let again: Edit = edit.to_string().parse().unwrap();
        prop_assert_eq!(again, edit);
    }

    #[test]
    fn patch_string_roundtrip(edits in prop::collection::vec(edit_text(), 0..5)) {
        let patch: Patch = edits.join(" | ").parse().unwrap();
        prop_assert_eq!(patch.len(), edits.len());
        let again: Patch = patch.to_string().parse().unwrap();
        prop_assert_eq!(again, patch);
    }

    #[test]
    fn xml_insert_keeps_unrelated_points(gap in 0usize..9, ingredient in 0usize..4) {
        let reference = xml();
        let mut model = xml();
        let kinds = reference.kinds();
        let before: Vec<(String, usize, Option<String>)> = kinds
            .iter()
            .filter(|k| !k.starts_with('_'))
            .flat_map(|k| {
                let n = reference.locations(k).len();
                (0..n).map(move |i| (k.clone(), i))
            })
            .map(|(k, i)| {
                let text = node_text(&reference, &k, i);
                (k, i, text)
            })
            .collect();
        let gaps = reference.locations("_inter_block");
        let target = &gaps[gap % gaps.len()];
        let ingredient = Location::new("t.xml", "stmt", ingredient);
        prop_assert!(model.do_insert(&reference, target, &ingredient).unwrap());
        for (kind, i, text) in before {
            // ancestors of the gap grow, everything else is unchanged
            if kind == "block" || kind == "if" {
                continue;
            }
            prop_assert_eq!(node_text(&model, &kind, i), text);
        }
    }

    #[test]
    fn line_insert_keeps_unrelated_points(gap in 0usize..5, ingredient in 0usize..4) {
        let reference = LineModel::parse("a.txt", "1\n2\n3\n4\n");
        let mut model = reference.clone();
        let shown: Vec<String> = reference.locations("line").iter().map(|l| reference.show_location(l)).collect();
        let target = Location::new("a.txt", "_inter_line", gap);
        prop_assert!(model.do_insert(&reference, &target, &Location::new("a.txt", "line", ingredient)).unwrap());
        let after: Vec<String> = model.locations("line").iter().map(|l| model.show_location(l)).collect();
        prop_assert_eq!(after, shown);
    }

    #[test]
    fn random_patches_materialize(seed in 0u64..500, length in 0usize..6) {
        let reference = reference();
        let mut rng = StdRng::seed_from_u64(seed);
        let kinds = ["LineReplacement", "LineInsertion", "LineDeletion", "LineMoving",
            "SrcmlStmtReplacement", "SrcmlStmtInsertion", "SrcmlStmtDeletion", "XmlNodeMoving<stmt,block>"];
        let mut patch = Patch::new();
        for i in 0..length {
            let kind: graft_core::EditKind = kinds[(seed as usize + i) % kinds.len()].parse().unwrap();
            patch = patch.with(kind.create(&reference, 10, &mut rng).unwrap());
        }
        let variant = Variant::new(&reference, patch.clone(), graft_core::DiffMethod::Unified).unwrap();
        let again = Variant::new(&reference, patch.to_string().parse().unwrap(), graft_core::DiffMethod::Unified).unwrap();
        prop_assert_eq!(variant.fingerprint(), again.fingerprint());
    }
}

#[test]
fn delete_is_idempotent_on_every_model() {
    let reference = reference();
    let mut working = reference.models().clone();
    for text in ["LineDeletion(('a.txt', 'line', 2))", "SrcmlStmtDeletion(('t.xml', 'stmt', 1))"] {
        let edit: Edit = text.parse().unwrap();
        assert!(edit.apply(reference.models(), &mut working).unwrap());
        assert!(!edit.apply(reference.models(), &mut working).unwrap());
    }
}

#[test]
fn self_replacement_is_noop() {
    let reference = reference();
    let mut working = reference.models().clone();
    for text in [
        "LineReplacement(('a.txt', 'line', 1), ('a.txt', 'line', 1))",
        "SrcmlStmtReplacement(('t.xml', 'stmt', 3), ('t.xml', 'stmt', 3))",
    ] {
        let edit: Edit = text.parse().unwrap();
        assert!(!edit.apply(reference.models(), &mut working).unwrap());
    }
}
