//! Import scenarios exercising the geometry document, the build graph and
//! the sidecar members.

mod common;

use common::{build_archive, geometry_document, triangle_object, MODEL_MEMBER};
use nalgebra::Matrix4;
use slicer3mf::{load_3mf_from_reader, Error, SlaPointsStatus};

#[test]
fn single_triangle_identity_item() {
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let (model, _, diagnostics) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();

    assert!(diagnostics.is_empty());
    assert_eq!(model.objects.len(), 1);

    let object = &model.objects[0];
    assert_eq!(object.instances.len(), 1);
    assert!(object.instances[0].printable);
    assert_eq!(*object.instances[0].matrix(), Matrix4::identity());

    // without a model config the whole geometry becomes a single volume
    assert_eq!(object.volumes.len(), 1);
    let mesh = &object.volumes[0].mesh;
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.indices.len(), 1);
    assert_eq!(mesh.vertices[1], [1.0, 0.0, 0.0]);
}

#[test]
fn inch_unit_scales_vertices() {
    let xml = geometry_document(
        "inch",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    let mesh = &model.objects[0].volumes[0].mesh;
    assert_eq!(mesh.vertices[1], [25.4, 0.0, 0.0]);
    assert_eq!(mesh.vertices[2], [0.0, 25.4, 0.0]);
}

#[test]
fn component_translation_composes_into_instance() {
    let body = format!(
        r#"<resources>{}<object id="2" type="model"><components>
<component objectid="1" transform="1 0 0 0 1 0 0 0 1 10 0 0"/>
</components></object></resources>
<build><item objectid="2"/></build>"#,
        triangle_object(1)
    );
    let xml = geometry_document("millimeter", &body);
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();

    assert_eq!(model.objects.len(), 1);
    let instance = &model.objects[0].instances[0];
    assert_eq!(instance.matrix()[(0, 3)], 10.0);
    // the mesh itself stays untranslated
    assert_eq!(model.objects[0].volumes[0].mesh.vertices[0], [0.0, 0.0, 0.0]);
}

fn component_chain(levels: u32) -> String {
    let mut body = String::from("<resources>");
    body.push_str(&triangle_object(1));
    for id in 2..=levels {
        body.push_str(&format!(
            r#"<object id="{id}" type="model"><components><component objectid="{}"/></components></object>"#,
            id - 1
        ));
    }
    body.push_str(&format!(
        "</resources><build><item objectid=\"{levels}\"/></build>"
    ));
    body
}

#[test]
fn deep_component_chain_within_limit_loads() {
    let xml = geometry_document("millimeter", &component_chain(10));
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    assert_eq!(model.objects.len(), 1);
    assert_eq!(model.objects[0].instances.len(), 1);
}

#[test]
fn component_chain_past_limit_is_rejected() {
    let xml = geometry_document("millimeter", &component_chain(11));
    let err = load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap_err();
    assert!(matches!(err, Error::AliasDepthExceeded(_)));
}

#[test]
fn printable_defaults_to_true_and_reads_zero() {
    let body = format!(
        r#"<resources>{}{}</resources><build>
<item objectid="1"/>
<item objectid="2" printable="0"/>
</build>"#,
        triangle_object(1),
        triangle_object(2)
    );
    let xml = geometry_document("millimeter", &body);
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    assert!(model.objects[0].instances[0].printable);
    assert!(!model.objects[1].instances[0].printable);
}

#[test]
fn newer_version_is_rejected_only_when_checking() {
    let body = format!(
        "<metadata name=\"slic3rpe:Version3mf\">9</metadata>\
         <resources>{}</resources><build><item objectid=\"1\"/></build>",
        triangle_object(1)
    );
    let xml = geometry_document("millimeter", &body);

    let err = load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), true).unwrap_err();
    assert!(matches!(
        err,
        Error::VersionTooNew {
            found: 9,
            supported: 2
        }
    ));

    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    assert_eq!(model.objects.len(), 1);
}

#[test]
fn duplicate_object_id_fails() {
    let body = format!(
        "<resources>{}{}</resources><build><item objectid=\"1\"/></build>",
        triangle_object(1),
        triangle_object(1)
    );
    let xml = geometry_document("millimeter", &body);
    let err = load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap_err();
    assert!(matches!(err, Error::DuplicateObjectId(1)));
}

#[test]
fn unknown_component_fails() {
    let body = r#"<resources><object id="1" type="model"><components>
<component objectid="99"/></components></object></resources><build/>"#;
    let xml = geometry_document("millimeter", body);
    let err = load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap_err();
    assert!(matches!(err, Error::UnknownComponent(99)));
}

#[test]
fn support_objects_are_not_imported() {
    let body = format!(
        r#"<resources>{}<object id="2" type="support"><mesh>
<vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
<triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object>
</resources><build><item objectid="1"/></build>"#,
        triangle_object(1)
    );
    let xml = geometry_document("millimeter", &body);
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    assert_eq!(model.objects.len(), 1);
}

#[test]
fn objects_without_instances_are_dropped() {
    let body = format!(
        "<resources>{}{}</resources><build><item objectid=\"2\"/></build>",
        triangle_object(1),
        triangle_object(2)
    );
    let xml = geometry_document("millimeter", &body);
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    // object 1 never acquired an instance
    assert_eq!(model.objects.len(), 1);
    assert_eq!(model.objects[0].instances.len(), 1);
}

#[test]
fn unnamed_objects_get_synthesized_names() {
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let (model, _, _) =
        load_3mf_from_reader(build_archive(&[(MODEL_MEMBER, &xml)]), false).unwrap();
    assert_eq!(model.objects[0].name, "model_1");
}

fn two_volume_document() -> String {
    let body = r#"<metadata name="slic3rpe:Version3mf">2</metadata>
<resources><object id="1" type="model"><mesh>
<vertices>
<vertex x="10" y="0" z="0"/><vertex x="11" y="0" z="0"/><vertex x="10" y="1" z="0"/>
<vertex x="0" y="0" z="4"/><vertex x="1" y="0" z="4"/><vertex x="0" y="1" z="4"/>
</vertices>
<triangles><triangle v1="0" v2="1" v3="2"/><triangle v1="3" v2="4" v3="5"/></triangles>
</mesh></object></resources>
<build><item objectid="1"/></build>"#;
    geometry_document("millimeter", body)
}

#[test]
fn version2_volume_matrices_revert_vertices() {
    let model_config = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
 <object id="1">
  <volume firstid="0" lastid="0">
   <metadata type="volume" key="matrix" value="1 0 0 10 0 1 0 0 0 0 1 0 0 0 0 1"/>
  </volume>
  <volume firstid="1" lastid="1">
   <metadata type="volume" key="matrix" value="1 0 0 0 0 1 0 0 0 0 1 4 0 0 0 1"/>
  </volume>
 </object>
</config>"#;
    let archive = build_archive(&[
        (MODEL_MEMBER, &two_volume_document()),
        ("Metadata/Slic3r_PE_model.config", model_config),
    ]);
    let (model, _, diagnostics) = load_3mf_from_reader(archive, true).unwrap();

    assert!(diagnostics.is_empty());
    let object = &model.objects[0];
    assert_eq!(object.volumes.len(), 2);

    // each volume got one facet, back-transformed into its local frame
    let first = &object.volumes[0];
    assert_eq!(first.mesh.indices.len(), 1);
    assert_eq!(first.mesh.vertices[0], [0.0, 0.0, 0.0]);
    assert_eq!(first.mesh.vertices[1], [1.0, 0.0, 0.0]);
    assert_eq!(first.matrix()[(0, 3)], 10.0);

    let second = &object.volumes[1];
    assert_eq!(second.mesh.indices.len(), 1);
    assert_eq!(second.mesh.vertices[0], [0.0, 0.0, 0.0]);
    assert_eq!(second.matrix()[(2, 3)], 4.0);
}

#[test]
fn bad_triangle_range_fails() {
    let model_config = r#"<config><object id="1">
<volume firstid="0" lastid="7"/>
</object></config>"#;
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        ("Metadata/Slic3r_PE_model.config", model_config),
    ]);
    let err = load_3mf_from_reader(archive, false).unwrap_err();
    assert!(matches!(err, Error::BadTriangleRange { .. }));
}

#[test]
fn duplicate_model_config_object_fails() {
    let model_config = r#"<config>
<object id="1"><volume firstid="0" lastid="0"/></object>
<object id="1"><volume firstid="0" lastid="0"/></object>
</config>"#;
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        ("Metadata/Slic3r_PE_model.config", model_config),
    ]);
    let err = load_3mf_from_reader(archive, false).unwrap_err();
    assert!(matches!(err, Error::DuplicateObjectId(1)));
}

#[test]
fn bad_metadata_type_fails() {
    let model_config = r#"<config><object id="1">
<metadata type="sidecar" key="name" value="x"/>
</object></config>"#;
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        ("Metadata/Slic3r_PE_model.config", model_config),
    ]);
    let err = load_3mf_from_reader(archive, false).unwrap_err();
    assert!(matches!(err, Error::BadMetadataType(_)));
}

#[test]
fn object_metadata_sets_name_and_config() {
    let model_config = r#"<config><object id="1">
<metadata type="object" key="name" value="Benchy &amp; Co"/>
<metadata type="object" key="layer_height" value="0.15"/>
<volume firstid="0" lastid="0">
 <metadata type="volume" key="name" value="hull"/>
 <metadata type="volume" key="modifier" value="1"/>
</volume>
</object></config>"#;
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        ("Metadata/Slic3r_PE_model.config", model_config),
    ]);
    let (model, _, _) = load_3mf_from_reader(archive, false).unwrap();

    let object = &model.objects[0];
    assert_eq!(object.name, "Benchy & Co");
    assert_eq!(object.config.opt_serialize("layer_height"), Some("0.15"));
    assert_eq!(object.volumes[0].name, "hull");
    assert!(object.volumes[0].is_modifier());
}

#[test]
fn sidecars_attach_by_model_index() {
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        (
            "Metadata/Slic3r_PE_layer_heights_profile.txt",
            "object_id=1|0;0.2;10;0.3\n",
        ),
        (
            "Metadata/Slic3r_PE_sla_support_points.txt",
            "support_points_format_version=1\nobject_id=1|0 0 0 0.5 1\n",
        ),
        (
            "Metadata/Prusa_Slicer_layer_config_ranges.xml",
            r#"<objects><object id="1"><range min_z="0" max_z="10">
<option opt_key="layer_height">0.1</option></range></object></objects>"#,
        ),
        ("Metadata/Slic3r_PE.config", "; layer_height = 0.2\n"),
    ]);
    let (model, config, diagnostics) = load_3mf_from_reader(archive, false).unwrap();

    assert!(diagnostics.is_empty());
    let object = &model.objects[0];
    assert_eq!(object.layer_height_profile, vec![0.0, 0.2, 10.0, 0.3]);
    assert_eq!(object.layer_config_ranges.len(), 1);
    assert_eq!(
        object.layer_config_ranges[0].config.opt_serialize("layer_height"),
        Some("0.1")
    );

    assert_eq!(object.sla_support_points.len(), 1);
    let point = &object.sla_support_points[0];
    assert_eq!(point.pos, [0.0, 0.0, 0.0]);
    assert_eq!(point.head_front_radius, 0.5);
    assert!(point.is_new_island);
    assert_eq!(object.sla_points_status, SlaPointsStatus::UserModified);

    assert_eq!(config.opt_serialize("layer_height"), Some("0.2"));
}

#[test]
fn malformed_sidecar_record_is_reported_not_fatal() {
    let xml = geometry_document(
        "millimeter",
        &format!(
            "<resources>{}</resources><build><item objectid=\"1\"/></build>",
            triangle_object(1)
        ),
    );
    let archive = build_archive(&[
        (MODEL_MEMBER, &xml),
        (
            "Metadata/Slic3r_PE_layer_heights_profile.txt",
            "garbage\nobject_id=1|0;0.2;10;0.3\n",
        ),
    ]);
    let (model, _, diagnostics) = load_3mf_from_reader(archive, false).unwrap();
    assert_eq!(diagnostics.messages().len(), 1);
    assert_eq!(
        model.objects[0].layer_height_profile,
        vec![0.0, 0.2, 10.0, 0.3]
    );
}

#[test]
fn archive_without_geometry_document_fails() {
    let archive = build_archive(&[("Metadata/Slic3r_PE.config", "; a = 1\n")]);
    let err = load_3mf_from_reader(archive, false).unwrap_err();
    assert!(matches!(err, Error::MemberRead { .. }));
}
