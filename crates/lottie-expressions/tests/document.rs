use lottie_expressions::{AnimatedProperty, Document, ExpressionEvaluator, PropertyValue};
use serde_json::json;

fn linear(t: f32, s: serde_json::Value) -> serde_json::Value {
    json!({ "t": t, "s": s, "o": { "x": [0], "y": [0] }, "i": { "x": [1], "y": [1] } })
}

fn document() -> Document {
    let json = json!({
        "v": "5.7.0",
        "nm": "Main",
        "ip": 0,
        "op": 90,
        "fr": 30,
        "w": 200,
        "h": 100,
        "assets": [
            {
                "id": "comp_1",
                "nm": "Inner Comp",
                "w": 50,
                "h": 40,
                "layers": [
                    {
                        "ty": 4,
                        "ind": 1,
                        "nm": "Inner",
                        "ip": 0,
                        "op": 90,
                        "st": 0,
                        "ks": { "r": { "a": 0, "k": 44 } },
                        "shapes": []
                    }
                ]
            }
        ],
        "layers": [
            {
                "ty": 4,
                "ind": 1,
                "nm": "Ball",
                "ip": 0,
                "op": 90,
                "st": 0,
                "ks": {
                    "p": {
                        "a": 1,
                        "k": [linear(0.0, json!([0, 0, 0])), { "t": 30, "s": [100, 50, 0] }],
                        "x": "loopOut(\"cycle\")"
                    },
                    "o": {
                        "a": 0,
                        "k": 100,
                        "x": "thisComp.layer(\"Ctrl\").effect(\"Slider\")(\"Slider\") * 2"
                    }
                },
                "shapes": [
                    {
                        "ty": "gr",
                        "nm": "Group 1",
                        "it": [
                            {
                                "ty": "el",
                                "nm": "Ellipse",
                                "s": { "a": 0, "k": [20, 20], "x": "[value[0] * 2, value[1]]" },
                                "p": { "a": 0, "k": [0, 0] }
                            },
                            {
                                "ty": "fl",
                                "nm": "Fill",
                                "c": { "a": 0, "k": [1, 0, 0, 1] },
                                "o": { "a": 0, "k": 100 }
                            },
                            {
                                "ty": "tr",
                                "nm": "Transform",
                                "p": { "a": 0, "k": [5, 5] },
                                "a": { "a": 0, "k": [0, 0] },
                                "s": { "a": 0, "k": [100, 100] },
                                "r": { "a": 0, "k": 0 },
                                "o": { "a": 0, "k": 100 }
                            }
                        ]
                    }
                ]
            },
            {
                "ty": 3,
                "ind": 2,
                "nm": "Ctrl",
                "ip": 0,
                "op": 90,
                "st": 0,
                "ks": {
                    "p": {
                        "s": true,
                        "x": { "a": 1, "k": [linear(0.0, json!([0])), { "t": 30, "s": [30] }] },
                        "y": { "a": 0, "k": 7 }
                    }
                },
                "ef": [
                    {
                        "ty": 5,
                        "nm": "Slider",
                        "en": 1,
                        "ef": [ { "ty": 0, "nm": "Slider", "v": { "a": 0, "k": 25 } } ]
                    }
                ]
            },
            {
                "ty": 0,
                "ind": 3,
                "nm": "Pre",
                "refId": "comp_1",
                "ip": 0,
                "op": 90,
                "st": 0,
                "ks": {
                    "r": {
                        "a": 0,
                        "k": 0,
                        "x": "comp(\"Inner Comp\").layer(\"Inner\").transform.rotation + 1"
                    }
                },
                "tm": {
                    "a": 1,
                    "k": [linear(0.0, json!([0])), { "t": 30, "s": [2] }],
                    "x": "value * 2"
                }
            }
        ]
    });
    Document::parse(&json.to_string()).unwrap()
}

fn components(value: PropertyValue) -> Vec<f64> {
    value.as_vector()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

mod bindings {
    use super::*;

    #[test]
    fn test_document_collects_expressions() {
        let doc = document();
        let paths: Vec<_> = doc
            .expressions()
            .iter()
            .map(|b| format!("{}/{}", b.layer.name, b.path))
            .collect();
        assert!(paths.contains(&"Ball/transform.position".to_string()));
        assert!(paths.contains(&"Ball/transform.opacity".to_string()));
        assert!(paths.contains(&"Ball/content(\"Group 1\").content(\"Ellipse\").size".to_string()));
        assert!(paths.contains(&"Pre/transform.rotation".to_string()));
        assert!(paths.contains(&"Pre/timeRemap".to_string()));
        assert_eq!(doc.compositions().len(), 2);
        assert_eq!(doc.main().name, "Main");
    }

    #[test]
    fn test_effect_slider_drives_opacity() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc.find("Ball", "transform.opacity").unwrap();
        assert_eq!(
            doc.sample(&evaluator, binding, 0.0),
            PropertyValue::Scalar(50.0)
        );
    }

    #[test]
    fn test_shape_expression_sees_its_value() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc
            .find("1", "content(\"Group 1\").content(\"Ellipse\").size")
            .unwrap();
        assert_eq!(
            components(doc.sample(&evaluator, binding, 0.0)),
            vec![40.0, 20.0]
        );

        let ball = &doc.main().layers[0];
        let group = &ball.content[0];
        assert_eq!(group.name, "Group 1");
        assert!(group.transform.is_some());
        assert_eq!(group.content.len(), 2);
    }

    #[test]
    fn test_precomp_is_reachable_by_name() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc.find("Pre", "transform.rotation").unwrap();
        assert_eq!(
            doc.sample(&evaluator, binding, 0.0),
            PropertyValue::Scalar(45.0)
        );

        let pre = doc.main().layer_by_name("Pre").unwrap();
        let source = pre.source.as_ref().unwrap();
        assert_eq!(source.name, "Inner Comp");
        assert_eq!(pre.width, 50.0);
    }

    #[test]
    fn test_cross_layer_reference_reads_keyframes() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc.find("Ball", "transform.opacity").unwrap();
        let ctx = doc.context(binding, 0.5);
        let x = evaluator
            .evaluate_on_property("thisComp.layer(\"Ctrl\").transform.position[0]", &ctx)
            .unwrap();
        assert!(approx(x.as_scalar(), 15.0), "{:?}", x);
    }
}

mod sampling {
    use super::*;

    #[test]
    fn test_loop_out_cycles_keyframes() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc.find("Ball", "transform.position").unwrap();

        let before = components(doc.sample(&evaluator, binding, 0.5));
        assert!(approx(before[0], 50.0) && approx(before[1], 25.0), "{:?}", before);

        let looped = components(doc.sample(&evaluator, binding, 1.5));
        assert!(approx(looped[0], 50.0) && approx(looped[1], 25.0), "{:?}", looped);
    }

    #[test]
    fn test_split_position_is_sampled_per_channel() {
        let doc = document();
        let ctrl = doc.main().layer_by_name("Ctrl").unwrap();
        let position = ctrl.transform.position.value_at_time(0.5);
        let position = components(position);
        assert!(approx(position[0], 15.0) && approx(position[1], 7.0), "{:?}", position);
        assert_eq!(ctrl.transform.position.key_times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_time_remap_expression() {
        let doc = document();
        let evaluator = ExpressionEvaluator::new();
        let binding = doc.find("Pre", "timeRemap").unwrap();
        let value = doc.sample(&evaluator, binding, 0.5).as_scalar();
        assert!(approx(value, 2.0), "{}", value);
    }
}
