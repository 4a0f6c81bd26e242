use schemata::{ComponentMask, Schema, World, ffi};

const SCHEMA: &str = r#"
[[enums]]
name = "Team"
values = ["Red", "Blue"]

[[structs]]
name = "Position"
component = true
fields = [
    { name = "x", type = "f32" },
    { name = "y", type = "f32" },
]

[[structs]]
name = "Player"
component = true
fields = [
    { name = "name", type = "string" },
    { name = "team", type = "Team" },
    { name = "trail", type = "vec2[]" },
]
"#;

fn main() {
    let schema = Schema::from_toml_str(SCHEMA).expect("schema should parse");
    for diagnostic in schema.diagnostics() {
        eprintln!("{}", diagnostic);
    }

    let mut world = World::new();
    schema.register_components(&mut world);
    let position = world.component_id("Position").unwrap();
    let player = world.component_id("Player").unwrap();

    let entity = world.new_entity();
    world.add_component(entity, position);
    world.add_component(entity, player);
    *world.field_mut::<f32>(entity, position, "x") = 1.0;
    world.text_mut(entity, player, "name").set("alice");
    world.vector_mut(entity, player, "trail").push_value([0.5f32, 0.25]);

    world.register_system("move", move |world: &mut World, dt: f32| {
        for entity in world.get_entities(ComponentMask::of(position)) {
            *world.field_mut::<f32>(entity, position, "y") += dt;
        }
    });
    world.invoke_system("move", 0.016);

    println!("world: {:?}", world);
    println!("entity: {:?}", entity);
    println!("name: {:?}", world.text(entity, player, "name"));
    println!("y: {}", world.field::<f32>(entity, position, "y"));

    for system in world.systems() {
        println!("system: {:?}", system);
    }

    for component in world.components() {
        match ffi::c_declaration(component.name(), component.layout()) {
            Ok(declaration) => println!("{}", declaration),
            Err(err) => eprintln!("{}: {}", component.name(), err),
        }
    }
}
