//! Unit tests for the mapping engine.

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use srd_core::payload::Monster;
use srd_core::{
    ChallengeRating, EntityType, FieldRule, MappingProfile, Payload, SizeCategory, Transform,
};

use super::*;

#[fixture]
fn engine() -> MappingEngine {
    MappingEngine::default()
}

fn monster_profile(rules: Vec<FieldRule>) -> MappingProfile {
    MappingProfile::new("monsters", "Monsters", EntityType::Monster, rules)
}

fn map_monster(engine: &MappingEngine, record: &Value, rules: Vec<FieldRule>) -> MappingOutcome {
    engine
        .map_with_profile(record, &monster_profile(rules))
        .expect("profile compiles")
}

fn monster(outcome: &MappingOutcome) -> &Monster {
    match outcome.entity.as_ref() {
        Some(Payload::Monster(monster)) => monster,
        other => panic!("expected a monster, got {other:?}"),
    }
}

#[rstest]
fn maps_the_goblin_end_to_end(engine: MappingEngine) {
    let record = json!({"slug": "goblin", "hit_points": 7, "challenge_rating": "1/4"});
    let outcome = map_monster(
        &engine,
        &record,
        vec![
            FieldRule::new("Id").from_sources(["slug"]),
            FieldRule::new("HitPoints").from_sources(["hit_points"]),
            FieldRule::new("Rating")
                .from_sources(["challenge_rating"])
                .with_transform(Transform::ParseFraction),
        ],
    );

    assert!(outcome.is_success(), "errors: {:?}", outcome.errors);
    assert!(outcome.warnings.is_empty());
    let goblin = monster(&outcome);
    assert_eq!(goblin.id, "goblin");
    assert_eq!(goblin.hit_points, 7);
    assert_eq!(goblin.challenge_rating.to_string(), "1/4");
}

#[rstest]
#[case(true)]
#[case(false)]
fn missing_values_fail_only_required_rules(engine: MappingEngine, #[case] required: bool) {
    let mut rule = FieldRule::new("HitPoints").from_sources(["hp_max", "stats.hp"]);
    if required {
        rule = rule.required();
    }
    let outcome = map_monster(&engine, &json!({"slug": "ghost"}), vec![rule]);

    if required {
        assert!(outcome.entity.is_none());
        assert_eq!(
            outcome.errors,
            vec!["field 'hit_points': none of [hp_max, stats.hp] is present"]
        );
    } else {
        assert!(outcome.errors.is_empty());
        assert_eq!(monster(&outcome).hit_points, 0);
        assert_eq!(outcome.warnings.len(), 1);
    }
}

#[rstest]
fn later_sources_fill_in_for_absent_ones(engine: MappingEngine) {
    let record = json!({"a": {"x": 1}, "c": 15});
    let outcome = map_monster(
        &engine,
        &record,
        vec![FieldRule::new("ArmorClass").from_sources(["a.b", "c"])],
    );
    assert_eq!(monster(&outcome).armor_class, 15);
}

#[rstest]
fn null_sources_count_as_absent(engine: MappingEngine) {
    let record = json!({"armor_class": null, "ac": 12});
    let outcome = map_monster(
        &engine,
        &record,
        vec![FieldRule::new("ArmorClass").from_sources(["armor_class", "ac"])],
    );
    assert_eq!(monster(&outcome).armor_class, 12);
}

#[rstest]
fn constants_override_sources(engine: MappingEngine) {
    let record = json!({"size": "Tiny"});
    let outcome = map_monster(
        &engine,
        &record,
        vec![
            FieldRule::new("Size")
                .from_sources(["size"])
                .with_constant(json!("h")),
        ],
    );
    assert_eq!(monster(&outcome).size, SizeCategory::Huge);
}

#[rstest]
fn constants_still_pass_through_transforms(engine: MappingEngine) {
    let outcome = map_monster(
        &engine,
        &json!({}),
        vec![
            FieldRule::new("Rating")
                .with_constant(json!("0.125"))
                .with_transform(Transform::ParseFraction),
        ],
    );
    assert_eq!(
        monster(&outcome).challenge_rating,
        ChallengeRating::from_fraction(1, 8).expect("valid fraction")
    );
}

#[rstest]
fn nested_targets_create_intermediate_objects(engine: MappingEngine) {
    let record = json!({"movement": {"walking": "30 ft.", "flying": 60}});
    let outcome = map_monster(
        &engine,
        &record,
        vec![
            FieldRule::new("Speed.Walk").from_sources(["movement.walking"]),
            FieldRule::new("speed.fly").from_sources(["movement.flying"]),
        ],
    );
    let speed = &monster(&outcome).speed;
    assert_eq!(speed.walk, 30);
    assert_eq!(speed.fly, 60);
}

#[rstest]
fn optional_coercion_failures_warn_and_leave_zero_values(engine: MappingEngine) {
    let outcome = map_monster(
        &engine,
        &json!({"hit_points": "lots", "name": "Blob"}),
        vec![
            FieldRule::new("HitPoints").from_sources(["hit_points"]),
            FieldRule::new("Name").from_sources(["name"]),
        ],
    );
    assert!(outcome.is_success());
    assert_eq!(monster(&outcome).hit_points, 0);
    assert_eq!(monster(&outcome).name, "Blob");
    assert_eq!(
        outcome.warnings,
        vec!["field 'hit_points': 'lots' is not a whole number"]
    );
}

#[rstest]
fn required_coercion_failures_reject_the_record(engine: MappingEngine) {
    let outcome = map_monster(
        &engine,
        &json!({"hit_points": "lots"}),
        vec![
            FieldRule::new("HitPoints")
                .from_sources(["hit_points"])
                .required(),
        ],
    );
    assert!(!outcome.is_success());
    assert!(outcome.entity.is_none());
    assert_eq!(outcome.errors.len(), 1);
}

#[rstest]
fn domain_fallbacks_warn_but_succeed(engine: MappingEngine) {
    let outcome = map_monster(
        &engine,
        &json!({"size": "colossal"}),
        vec![
            FieldRule::new("Size")
                .from_sources(["size"])
                .with_transform(Transform::ParseSize)
                .required(),
        ],
    );
    assert!(outcome.is_success());
    assert_eq!(monster(&outcome).size, SizeCategory::Medium);
    assert_eq!(
        outcome.warnings,
        vec!["field 'size': 'colossal' is not a valid size category; using Medium"]
    );
}

#[rstest]
fn text_transforms_run_before_coercion(engine: MappingEngine) {
    let outcome = map_monster(
        &engine,
        &json!({"name": "  Hobgoblin Captain  "}),
        vec![
            FieldRule::new("Name")
                .from_sources(["name"])
                .with_transform(Transform::Upper),
            FieldRule::new("Alignment")
                .with_constant(json!(" lawful evil "))
                .with_transform(Transform::Trim),
        ],
    );
    assert_eq!(monster(&outcome).name, "  HOBGOBLIN CAPTAIN  ");
    assert_eq!(monster(&outcome).alignment, "lawful evil");
}

#[rstest]
fn sourceless_rules_auto_match_synonyms_and_casing(engine: MappingEngine) {
    let record = json!({"STR": 18, "HitPoints": 45, "cr": "2", "Id": "ogre"});
    let outcome = map_monster(
        &engine,
        &record,
        vec![
            FieldRule::new("id").required(),
            FieldRule::new("strength"),
            FieldRule::new("hit_points"),
            FieldRule::new("challenge_rating"),
        ],
    );
    let ogre = monster(&outcome);
    assert_eq!(ogre.id, "ogre");
    assert_eq!(ogre.strength, 18);
    assert_eq!(ogre.hit_points, 45);
    assert_eq!(ogre.challenge_rating, ChallengeRating::Whole(2));
}

#[rstest]
fn auto_match_profiles_fill_untargeted_fields_quietly(engine: MappingEngine) {
    let profile = monster_profile(vec![FieldRule::new("Id").from_sources(["slug"]).required()])
        .with_auto_match();
    let record = json!({
        "slug": "wolf",
        "name": "Wolf",
        "size": "Medium",
        "type": "beast",
        "hit_points": 11,
        "speed": {"walk": 40},
        "challenge_rating": 0.25,
        "skills": {"perception": 3, "stealth": 4},
        "damage_immunities": ""
    });
    let outcome = engine
        .map_with_profile(&record, &profile)
        .expect("profile compiles");

    assert!(outcome.is_success(), "errors: {:?}", outcome.errors);
    assert!(outcome.warnings.is_empty(), "warnings: {:?}", outcome.warnings);
    let wolf = monster(&outcome);
    assert_eq!(wolf.id, "wolf");
    assert_eq!(wolf.name, "Wolf");
    assert_eq!(wolf.speed.walk, 40);
    assert_eq!(wolf.challenge_rating.to_string(), "1/4");
    assert_eq!(wolf.skills.get("stealth"), Some(&4));
}

#[rstest]
fn unknown_targets_fail_compilation() {
    let err = CompiledProfile::compile(&monster_profile(vec![FieldRule::new("Speed.Teleport")]))
        .expect_err("unknown target");
    assert_eq!(
        err,
        ProfileError::UnknownTarget {
            profile_id: "monsters".to_owned(),
            entity_type: EntityType::Monster,
            target: "Speed.Teleport".to_owned(),
        }
    );
}

#[rstest]
fn incompatible_transforms_fail_compilation() {
    let profile = monster_profile(vec![
        FieldRule::new("HitPoints").with_transform(Transform::ParseDice),
    ]);
    let err = CompiledProfile::compile(&profile).expect_err("dice into an integer");
    assert!(matches!(
        err,
        ProfileError::IncompatibleTransform { ref target, .. } if target == "hit_points"
    ));
}

#[rstest]
fn feed_type_mismatches_name_both_sides() {
    let compiled = CompiledProfile::compile(&monster_profile(Vec::new())).expect("empty profile");
    assert!(compiled.ensure_feed_type("orcs", EntityType::Monster).is_ok());
    let err = compiled
        .ensure_feed_type("spells", EntityType::Spell)
        .expect_err("mismatch");
    assert_eq!(
        err.to_string(),
        "feed 'spells' carries Spell but profile 'monsters' maps Monster"
    );
}
