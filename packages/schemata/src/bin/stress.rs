use schemata::{ComponentMask, FieldType, Primitive, Query, StructBuilder, World};

fn main() {
    let mut world = World::new();
    let health = world.register_component("Health", StructBuilder::new()
        .add_field("value", FieldType::primitive(Primitive::I32))
        .build());
    let inventory = world.register_component("Inventory", StructBuilder::new()
        .add_field("items", FieldType::vector(FieldType::primitive(Primitive::U32)))
        .build());

    let mut to_delete = Vec::new();

    for _ in 0..8 {
        for id in to_delete.drain(..) {
            world.destroy_entity(id);
        }

        for idx in 0..512 {
            let entity = world.new_entity();
            world.add_component(entity, health);
            *world.field_mut::<i32>(entity, health, "value") = 32;

            if idx % 3 == 0 {
                world.add_component(entity, inventory);
                world.vector_mut(entity, inventory, "items").push_value(idx as u32);
            }

            if idx % 12 == 11 {
                to_delete.push(entity);
            }
        }
    }

    let without_inventory = Query::new(ComponentMask::of(health))
        .without(ComponentMask::of(inventory));

    println!("entities: {}", world.num_entities());
    println!("with inventory: {}", world.get_entities(ComponentMask::of(inventory)).len());
    println!("without inventory: {}", world.query(&without_inventory).len());
    println!("health pool: {:?}", world.component_pool(health));
}
