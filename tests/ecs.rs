use lumentile::ecs::components::{ShaderComponent, SunComponent, TextureRef, TileTransform, TileVisual};
use lumentile::ecs::*;
use lumentile::LightComponent;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn grass() -> TileVisual {
        TileVisual::new(TextureRef::new("grass.png"))
    }

    fn lamp() -> LightComponent {
        LightComponent::point(Vec3::ZERO, Vec3::ONE, 0.1, 0.01)
    }

    // -- spawn / despawn / generational safety ------------------------------

    #[test]
    fn spawn_returns_unique_entities() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        assert_ne!(a, b);
    }

    #[test]
    fn despawn_marks_entity_dead() {
        let mut world = World::new();
        let e = world.spawn();
        assert!(world.is_alive(e));
        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
    }

    #[test]
    fn despawn_dead_entity_returns_false() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);
        assert!(!world.despawn(e));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut world = World::new();
        let old = world.spawn();
        world.insert(old, TileTransform::new(1, 1));
        world.despawn(old);

        let new = world.spawn();
        assert_eq!(old.id(), new.id()); // recycled slot
        assert_ne!(old.generation(), new.generation());

        assert!(!world.is_alive(old));
        assert!(world.get::<TileTransform>(old).is_none());
    }

    // -- components ---------------------------------------------------------

    #[test]
    fn insert_overwrites_existing() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, TileTransform::new(0, 0));
        world.insert(e, TileTransform::new(4, -2));
        assert_eq!(world.get::<TileTransform>(e), Some(&TileTransform::new(4, -2)));
    }

    #[test]
    fn get_mut_modifies_in_place() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::light(lamp()));
        world.get_mut::<LightComponent>(e).unwrap().set_off(true);
        assert!(world.get::<LightComponent>(e).unwrap().is_off());
    }

    #[test]
    fn remove_returns_component() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::tile(TileTransform::new(2, 3), grass()));
        assert_eq!(world.remove::<TileTransform>(e), Some(TileTransform::new(2, 3)));
        assert!(!world.has::<TileTransform>(e));
        assert!(world.has::<TileVisual>(e));
    }

    #[test]
    #[should_panic(expected = "dead entity")]
    fn insert_on_dead_entity_panics() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);
        world.insert(e, TileTransform::new(0, 0));
    }

    #[test]
    fn despawn_cleans_up_all_components() {
        let mut world = World::new();
        let e = world.spawn_desc(
            EntityDesc::light(LightComponent::directional(Vec3::Z, Vec3::ONE)).with_sun(SunComponent { time_of_day: 0.0 }),
        );
        world.despawn(e);
        let again = world.spawn();
        assert_eq!(again.id(), e.id());
        assert!(world.kinds(again).is_empty());
    }

    // -- queries and filters ------------------------------------------------

    #[test]
    fn query_iterates_all_components() {
        let mut world = World::new();
        for x in 0..3 {
            world.spawn_desc(EntityDesc::tile(TileTransform::new(x, 0), grass()));
        }
        world.spawn_desc(EntityDesc::light(lamp()));

        let mut xs: Vec<i32> = world.query::<TileTransform>().map(|(_, t)| t.x).collect();
        xs.sort();
        assert_eq!(xs, vec![0, 1, 2]);
        assert_eq!(world.query::<LightComponent>().count(), 1);
    }

    #[test]
    fn query_mut_modifies_components() {
        let mut world = World::new();
        let a = world.spawn_desc(EntityDesc::light(lamp()));
        let b = world.spawn_desc(EntityDesc::light(lamp()));
        for (_, light) in world.query_mut::<LightComponent>() {
            light.set_color(Vec3::X);
        }
        assert_eq!(world.get::<LightComponent>(a).unwrap().color(), Vec3::X);
        assert_eq!(world.get::<LightComponent>(b).unwrap().color(), Vec3::X);
    }

    #[test]
    fn query_empty_world() {
        let world = World::new();
        assert_eq!(world.query::<ShaderComponent>().count(), 0);
    }

    #[test]
    fn filtered_respects_all_any_and_none() {
        let mut world = World::new();
        let tile = world.spawn_desc(EntityDesc::tile(TileTransform::new(0, 0), grass()));
        let light = world.spawn_desc(EntityDesc::light(lamp()));
        let sun = world.spawn_desc(
            EntityDesc::light(LightComponent::directional(Vec3::Z, Vec3::ONE)).with_sun(SunComponent { time_of_day: 0.0 }),
        );

        let tiles = Filter::require_all(&[ComponentKind::TileTransform, ComponentKind::TileVisual]);
        assert_eq!(world.filtered(&tiles), vec![tile]);

        let plain_lights = Filter::require_all(&[ComponentKind::Light]).reject_any(&[ComponentKind::Sun]);
        assert_eq!(world.filtered(&plain_lights), vec![light]);

        let anything_lit = Filter::require_any(&[ComponentKind::Light, ComponentKind::Shader]);
        assert_eq!(world.filtered(&anything_lit), vec![light, sun]);
    }

    #[test]
    fn has_returns_false_for_dead_entity() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::light(lamp()));
        world.despawn(e);
        assert!(!world.has::<LightComponent>(e));
    }

    #[test]
    fn queued_despawn_waits_for_flush() {
        let mut world = World::new();
        let e = world.spawn_desc(EntityDesc::light(lamp()));
        world.queue_despawn(e);
        world.queue_despawn(e);
        assert!(world.is_alive(e));
        assert_eq!(world.len(), 1);
    }
}
