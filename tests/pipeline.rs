// End-to-end scenarios: buildFile + CloudInfo on disk → exported JSON → TTS save,
// and symbol crops on disk → tagged records

use redstrike_tts::tree_walker::read_json_map;
use redstrike_tts::{
    flatten, parse_document, parse_module, read_flattened, write_json, AssociationTable, CardBacks,
    ConversionReport, NodeKind, ObjectTemplates, PackagingLayout, Packager,
};
use serde_json::json;
use std::fs;

const BUILD_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VASSAL.build.GameModule name="Red Strike" version="1.2">
  <VASSAL.build.module.PieceWindow name="Pieces">
    <VASSAL.build.widget.TabWidget entryName="Pieces">
      <VASSAL.build.widget.TabWidget entryName="NATO Units">
        <VASSAL.build.widget.TabWidget entryName="US">
          <VASSAL.build.widget.ListWidget entryName="Army">
            <VASSAL.build.widget.PieceSlot entryName="M1" gpid="1">+/null/prototype;Unit	piece;;;tank.png,tank_back.png;M1/</VASSAL.build.widget.PieceSlot>
          </VASSAL.build.widget.ListWidget>
        </VASSAL.build.widget.TabWidget>
      </VASSAL.build.widget.TabWidget>
      <VASSAL.build.widget.TabWidget entryName="Cards">
        <VASSAL.build.widget.TabWidget entryName="NATO Cards">
          <VASSAL.build.widget.ListWidget entryName="deck">
            <VASSAL.build.widget.PieceSlot entryName="Air Strike" gpid="2">piece;;;card.png;Air Strike/</VASSAL.build.widget.PieceSlot>
          </VASSAL.build.widget.ListWidget>
        </VASSAL.build.widget.TabWidget>
      </VASSAL.build.widget.TabWidget>
      <VASSAL.build.widget.TabWidget entryName="Markers">
        <VASSAL.build.widget.ListWidget entryName="Game Turn">
          <VASSAL.build.widget.PieceSlot entryName="Turn" gpid="3">piece;;;mrk.png;Turn/</VASSAL.build.widget.PieceSlot>
        </VASSAL.build.widget.ListWidget>
      </VASSAL.build.widget.TabWidget>
    </VASSAL.build.widget.TabWidget>
  </VASSAL.build.module.PieceWindow>
</VASSAL.build.GameModule>
"#;

fn cloud_info() -> bson::Document {
    bson::doc! {
        "k1": { "Name": "tank.png", "URL": "http://x/1" },
        "k2": { "Name": "tank_back.png", "URL": "http://x/2" },
        "k3": { "Name": "card.png", "URL": "http://x/card" },
        "k4": { "Name": "NATO_Card_Back.png", "URL": "http://x/nato" },
        "k5": { "Name": "mrk.png", "URL": "http://x/mrk" },
    }
}

#[test]
fn test_module_export_and_packaging_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let bson_path = dir.path().join("CloudInfo.bson");
    let mut bytes = Vec::new();
    cloud_info().to_writer(&mut bytes).unwrap();
    fs::write(&bson_path, &bytes).unwrap();

    let table = AssociationTable::from_bson_reader(fs::File::open(&bson_path).unwrap()).unwrap();
    assert_eq!(table.len(), 5);

    let document = parse_document(BUILD_FILE).unwrap();
    let module = parse_module(&document, &table, &CardBacks::default()).unwrap();

    // Faction → Nation → Command → Unit
    let factions = flatten(&module.factions);
    assert_eq!(
        factions["NATO Units"]["US"]["Army"]["M1"],
        json!({
            "front_png": "tank.png",
            "front_png_url": "http://x/1",
            "back_png": "tank_back.png",
            "back_png_url": "http://x/2",
        })
    );

    let cards = flatten(&module.deck_nodes());
    assert_eq!(cards["NATO Cards"]["Air Strike"]["back_png_url"], "http://x/nato");

    let markers = flatten(&module.marker_nodes());
    assert_eq!(markers["Game Turn"]["Turn"]["back_png_url"], "http://x/mrk");

    let report = ConversionReport::from_module(&module);
    assert_eq!(report.leaf_count(NodeKind::Unit), 1);
    assert_eq!(report.leaf_count(NodeKind::Card), 1);
    assert_eq!(report.leaf_count(NodeKind::Marker), 1);
    assert!(report.unresolved.is_empty());

    // Written and read back through the files the CLI produces
    let factions_path = dir.path().join("module_factions.json");
    let cards_path = dir.path().join("module_cards.json");
    write_json(&factions_path, &factions).unwrap();
    write_json(&cards_path, &cards).unwrap();

    let factions = read_json_map(&factions_path).unwrap();
    let cards = read_json_map(&cards_path).unwrap();

    let leaves = read_flattened(&factions);
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].0, "M1");
    assert_eq!(leaves[0].1.front_png_url.as_deref(), Some("http://x/1"));

    let templates = ObjectTemplates::embedded().unwrap();
    let save = Packager::new(&templates)
        .build_save(&factions, &cards, &PackagingLayout::default())
        .unwrap();

    let root = &save["ObjectStates"][0];
    let contained = root["ContainedObjects"].as_array().unwrap();
    assert_eq!(contained.len(), 2);

    let tank = &contained[0]["ContainedObjects"][0]["ContainedObjects"][0]["ContainedObjects"][0];
    assert_eq!(tank["Nickname"], "M1");
    assert_eq!(tank["Tags"], json!(["NATO", "US", "Army"]));
    assert_eq!(tank["CustomImage"]["ImageSecondaryURL"], "http://x/2");

    let deck = &contained[1];
    assert_eq!(deck["Nickname"], "NATO Cards");
    assert_eq!(deck["DeckIDs"], json!([101]));
}

#[test]
fn test_unknown_image_leaves_locator_absent() {
    let table = AssociationTable::from_document(&bson::doc! {
        "k1": { "Name": "other.png", "URL": "http://x/other" },
    });

    let document = parse_document(BUILD_FILE).unwrap();
    let module = parse_module(&document, &table, &CardBacks::default()).unwrap();
    let factions = flatten(&module.factions);

    assert_eq!(factions["NATO Units"]["US"]["Army"]["M1"]["front_png_url"], json!(null));

    let report = ConversionReport::from_module(&module);
    assert_eq!(report.unresolved.len(), 3);
}

#[cfg(feature = "tagging")]
mod tagging {
    use image::{ImageBuffer, Rgb, RgbImage};
    use redstrike_tts::tagging::{classify_directory, post_process, Classifier, OverrideTable, UnitFormation, UnitType};
    use redstrike_tts::TaggingConfig;
    use std::fs;
    use std::sync::Arc;

    fn symbol(seed: u32) -> RgbImage {
        ImageBuffer::from_fn(41, 33, |x, y| {
            let v = (x.wrapping_mul(seed) ^ y.wrapping_mul(31)).wrapping_mul(2654435761) >> 24;
            Rgb([v as u8, (v >> 1) as u8, (255 - v) as u8])
        })
    }

    #[tokio::test]
    async fn test_override_wins_regardless_of_matching() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let images = dir.path().join("images");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&templates).unwrap();

        symbol(7).save(images.join("7A_US_F_2.png")).unwrap();
        symbol(11).save(images.join("RS_Naval_F_1.png")).unwrap();
        symbol(13).save(images.join("RS_Ground_Units_F_1.png")).unwrap();

        // No templates at all: every computed record is unclassified
        let classifier = Arc::new(Classifier::load(&templates, TaggingConfig::default()));
        let computed = classify_directory(classifier, &images).await.unwrap();
        assert_eq!(computed.len(), 3);
        assert!(computed.iter().all(|r| r.is_unclassified()));

        let report = post_process(computed, &OverrideTable::built_in());

        let missile = report.records.iter().find(|r| r.filename == "7A_US_F_2.png").unwrap();
        assert_eq!(missile.unit_type, Some(UnitType::Missile));
        assert_eq!(missile.unit_formation, None::<UnitFormation>);

        assert!(report.records.iter().any(|r| r.filename == "RS_Naval_F_1.png"));
        assert_eq!(report.excluded, vec!["RS_Ground_Units_F_1.png".to_string()]);
        assert_eq!(report.records.len(), 13);
    }
}
